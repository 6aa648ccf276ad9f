//! Capabilities supplied by the embedding runtime
//!
//! Procedures and event handlers are looked up by their exact dotted name
//! (e.g. `"StartPLC"` or `"trace.Updated"`) when a session joins.

use crate::error::{CallError, RegistrationError};
use crate::protocol::Payload;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Target of a remotely callable procedure
#[async_trait]
pub trait Callable: Send + Sync {
    async fn invoke(&self, payload: Payload) -> Result<Payload, CallError>;
}

/// Target of a subscribed topic
#[async_trait]
pub trait Publishable: Send + Sync {
    async fn notify(&self, payload: Payload);
}

/// [`Callable`] backed by an async closure
pub struct FnCallable<F>(pub F);

#[async_trait]
impl<F, Fut> Callable for FnCallable<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, CallError>> + Send,
{
    async fn invoke(&self, payload: Payload) -> Result<Payload, CallError> {
        (self.0)(payload).await
    }
}

/// [`Publishable`] backed by an async closure
pub struct FnPublishable<F>(pub F);

#[async_trait]
impl<F, Fut> Publishable for FnPublishable<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn notify(&self, payload: Payload) {
        (self.0)(payload).await
    }
}

/// Name → target lookup table
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    callables: HashMap<String, Arc<dyn Callable>>,
    publishables: HashMap<String, Arc<dyn Publishable>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_callable(
        &mut self,
        name: impl Into<String>,
        target: Arc<dyn Callable>,
    ) -> &mut Self {
        self.callables.insert(name.into(), target);
        self
    }

    /// Register an async closure as a procedure target
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, CallError>> + Send + 'static,
    {
        self.register_callable(name, Arc::new(FnCallable(f)))
    }

    pub fn register_publishable(
        &mut self,
        name: impl Into<String>,
        target: Arc<dyn Publishable>,
    ) -> &mut Self {
        self.publishables.insert(name.into(), target);
        self
    }

    /// Register an async closure as an event handler
    pub fn register_handler<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_publishable(name, Arc::new(FnPublishable(f)))
    }

    pub fn resolve_callable(&self, name: &str) -> Result<Arc<dyn Callable>, RegistrationError> {
        self.callables
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::Unresolved {
                name: name.to_string(),
            })
    }

    pub fn resolve_publishable(
        &self,
        name: &str,
    ) -> Result<Arc<dyn Publishable>, RegistrationError> {
        self.publishables
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::Unresolved {
                name: name.to_string(),
            })
    }

    pub fn contains_callable(&self, name: &str) -> bool {
        self.callables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.callables.len() + self.publishables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callables.is_empty() && self.publishables.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut callables: Vec<_> = self.callables.keys().collect();
        callables.sort();
        let mut publishables: Vec<_> = self.publishables.keys().collect();
        publishables.sort();
        f.debug_struct("CapabilityRegistry")
            .field("callables", &callables)
            .field("publishables", &publishables)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_closure_callable_roundtrip() {
        let mut registry = CapabilityRegistry::new();
        registry.register_fn("GetPLCID", |_payload| async {
            Ok(Payload::from(json!("plc-42")))
        });

        let target = registry.resolve_callable("GetPLCID").unwrap();
        let result = target.invoke(Payload::empty()).await.unwrap();
        assert_eq!(result.first(), Some(&json!("plc-42")));
    }

    #[test]
    fn test_unresolved_name() {
        let registry = CapabilityRegistry::new();
        assert_eq!(
            registry.resolve_callable("SeedBlob").err(),
            Some(RegistrationError::Unresolved {
                name: "SeedBlob".into()
            })
        );
        assert!(registry.resolve_publishable("Updated").is_err());
    }
}
