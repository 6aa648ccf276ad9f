//! Static catalog of exposed procedures, subscribed topics and on-join hooks

use crate::protocol::Dict;
use crate::session::SessionHandle;
use std::sync::Arc;

/// Procedures every PLC runtime exposes, qualified as `"{ID}.{name}"`
pub const PLC_PROCEDURES: [&str; 15] = [
    "StartPLC",
    "StopPLC",
    "GetPLCstatus",
    "GetPLCID",
    "SeedBlob",
    "AppendChunkToBlob",
    "PurgeBlobs",
    "NewPLC",
    "RepairPLC",
    "MatchMD5",
    "SetTraceVariablesList",
    "GetTraceVariables",
    "RemoteExec",
    "GetLogMessage",
    "ResetLogCount",
];

/// Late-bound behavior run with the fresh session after every join
pub type OnJoinHook = Arc<dyn Fn(&SessionHandle) -> anyhow::Result<()> + Send + Sync>;

/// One exposed procedure: capability name plus register keywords
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedCall {
    pub name: String,
    pub options: Dict,
}

impl ExposedCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Dict::new(),
        }
    }

    pub fn with_options(name: impl Into<String>, options: Dict) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

/// Ordered catalog, fixed once the controller is built
#[derive(Clone, Default)]
pub struct Catalog {
    exposed_calls: Vec<ExposedCall>,
    subscribed_events: Vec<String>,
    on_join: Vec<OnJoinHook>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The PLC runtime procedures, no topics and no hooks
    pub fn plc_runtime() -> Self {
        let mut catalog = Self::new();
        for name in PLC_PROCEDURES {
            catalog.expose(name);
        }
        catalog
    }

    pub fn expose(&mut self, name: impl Into<String>) -> &mut Self {
        self.exposed_calls.push(ExposedCall::new(name));
        self
    }

    pub fn expose_with_options(&mut self, name: impl Into<String>, options: Dict) -> &mut Self {
        self.exposed_calls.push(ExposedCall::with_options(name, options));
        self
    }

    /// Subscribe a capability to a topic of the same name
    pub fn subscribe(&mut self, topic: impl Into<String>) -> &mut Self {
        self.subscribed_events.push(topic.into());
        self
    }

    pub fn on_join<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&SessionHandle) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_join.push(Arc::new(hook));
        self
    }

    pub fn exposed_calls(&self) -> &[ExposedCall] {
        &self.exposed_calls
    }

    pub fn subscribed_events(&self) -> &[String] {
        &self.subscribed_events
    }

    pub fn on_join_hooks(&self) -> &[OnJoinHook] {
        &self.on_join
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("exposed_calls", &self.exposed_calls)
            .field("subscribed_events", &self.subscribed_events)
            .field("on_join", &self.on_join.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plc_runtime_catalog_order() {
        let catalog = Catalog::plc_runtime();
        let names: Vec<_> = catalog
            .exposed_calls()
            .iter()
            .map(|call| call.name.as_str())
            .collect();

        assert_eq!(names.len(), 15);
        assert_eq!(names.first(), Some(&"StartPLC"));
        assert_eq!(names.last(), Some(&"ResetLogCount"));
        assert!(catalog.subscribed_events().is_empty());
        assert!(catalog.on_join_hooks().is_empty());
    }
}
