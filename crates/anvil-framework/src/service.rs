//! Services: long-lived objects other fragments depend on.
//!
//! A service is registered under its fragment name. Commands declare the
//! services they need with `depends_on`, and the manager refuses to enable a
//! command until every one of them is present here.
//!
//! Handlers fetch a typed service through [`ServiceRegistry::get_as`]:
//!
//! ```rust,ignore
//! let stats = ctx.manager().services().get_as::<StatsService>("stats");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::BoxError;

/// A long-lived fragment.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Called once after registration.
    async fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called when the service is replaced or the runtime stops.
    async fn stop(&self) {}

    /// Returns self as an `Arc<dyn Any>` for downcasting.
    ///
    /// Implementors should simply return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Name → live service.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, returning the one it replaced.
    pub fn register(&self, name: &str, service: Arc<dyn Service>) -> Option<Arc<dyn Service>> {
        self.services.write().insert(name.to_lowercase(), service)
    }

    /// Removes a service.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.write().remove(&name.to_lowercase())
    }

    /// Returns `true` if a service is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(&name.to_lowercase())
    }

    /// Returns a service.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.read().get(&name.to_lowercase()).cloned()
    }

    /// Returns a service downcast to its concrete type.
    pub fn get_as<T: Service>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name)?.as_any().downcast::<T>().ok()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Returns `true` if no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Removes every service, returning them.
    pub fn drain(&self) -> Vec<(String, Arc<dyn Service>)> {
        self.services.write().drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stats;

    #[async_trait]
    impl Service for Stats {
        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    struct Other;

    #[async_trait]
    impl Service for Other {
        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ServiceRegistry::new();
        assert!(!registry.contains("stats"));
        assert!(registry.register("Stats", Arc::new(Stats)).is_none());
        assert!(registry.contains("stats"));
        assert!(registry.get_as::<Stats>("stats").is_some());
        assert!(registry.get_as::<Other>("stats").is_none());
        assert_eq!(registry.names(), vec!["stats"]);
    }

    #[test]
    fn test_replace_returns_previous() {
        let registry = ServiceRegistry::new();
        registry.register("stats", Arc::new(Stats));
        let previous = registry.register("stats", Arc::new(Other));
        assert!(previous.is_some());
        assert!(registry.get_as::<Other>("stats").is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("stats").is_some());
        assert!(registry.is_empty());
    }
}
