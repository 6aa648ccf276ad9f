//! Binding of the static catalog to runtime capabilities
//!
//! Resolution happens at join time, never before, so the embedding runtime
//! may fill the [`CapabilityRegistry`] after the controller was built.

pub mod capability;
pub mod catalog;
pub mod options;

pub use capability::{Callable, CapabilityRegistry, FnCallable, FnPublishable, Publishable};
pub use catalog::{Catalog, ExposedCall, OnJoinHook, PLC_PROCEDURES};
pub use options::{InvokePolicy, MatchPolicy, RegisterOptions};

use crate::error::RegistrationError;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// A procedure ready to be registered
#[derive(Clone)]
pub struct ProcedureBinding {
    /// Capability name from the catalog
    pub name: String,
    /// Qualified procedure URI, `"{ID}.{name}"`
    pub procedure: String,
    pub options: RegisterOptions,
    pub target: Arc<dyn Callable>,
}

/// A topic ready to be subscribed
#[derive(Clone)]
pub struct TopicBinding {
    pub topic: String,
    pub target: Arc<dyn Publishable>,
}

/// Result of resolving the catalog for one join
#[derive(Default)]
pub struct BindingPlan {
    pub procedures: Vec<ProcedureBinding>,
    pub topics: Vec<TopicBinding>,
    /// Entries that could not be resolved; already logged
    pub failures: Vec<RegistrationError>,
}

/// Catalog plus the capabilities it resolves against
#[derive(Clone)]
pub struct Registry {
    catalog: Catalog,
    capabilities: Arc<RwLock<CapabilityRegistry>>,
}

impl Registry {
    pub fn new(catalog: Catalog, capabilities: CapabilityRegistry) -> Self {
        Self {
            catalog,
            capabilities: Arc::new(RwLock::new(capabilities)),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shared capability table; changes apply from the next join
    pub fn capabilities(&self) -> Arc<RwLock<CapabilityRegistry>> {
        Arc::clone(&self.capabilities)
    }

    /// Resolve every catalog entry for the client `id`
    ///
    /// An unresolvable entry is logged and skipped; it never prevents the
    /// following entries from binding.
    pub fn bind(&self, id: &str) -> BindingPlan {
        let capabilities = self.capabilities.read();
        let mut plan = BindingPlan::default();

        for call in self.catalog.exposed_calls() {
            let procedure = format!("{}.{}", id, call.name);
            match capabilities.resolve_callable(&call.name) {
                Ok(target) => plan.procedures.push(ProcedureBinding {
                    options: RegisterOptions::resolve(&procedure, &call.options),
                    name: call.name.clone(),
                    procedure,
                    target,
                }),
                Err(e) => {
                    warn!("Cannot register {}: {}", procedure, e);
                    plan.failures.push(e);
                }
            }
        }

        for topic in self.catalog.subscribed_events() {
            match capabilities.resolve_publishable(topic) {
                Ok(target) => plan.topics.push(TopicBinding {
                    topic: topic.clone(),
                    target,
                }),
                Err(e) => {
                    warn!("Cannot subscribe to {}: {}", topic, e);
                    plan.failures.push(e);
                }
            }
        }

        plan
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("catalog", &self.catalog)
            .field("capabilities", &*self.capabilities.read())
            .finish()
    }
}
