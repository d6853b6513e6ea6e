//! Named service locator

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BeaconError, Result};

type SharedService = Arc<dyn Any + Send + Sync>;
type ServiceFactory = Arc<dyn Fn() -> Result<SharedService> + Send + Sync>;

/// Registry the surrounding bootstrap uses to hand named subsystems to
/// phase functions. The resilience core itself never looks anything up.
#[derive(Default)]
pub struct ServiceRegistry {
    /// Singleton services
    singletons: RwLock<HashMap<String, SharedService>>,

    /// Service factories, invoked on every resolve
    factories: RwLock<HashMap<String, ServiceFactory>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a singleton service under `name`
    pub fn register_singleton<T>(&self, name: impl Into<String>, service: T) -> &Self
    where
        T: Send + Sync + 'static,
    {
        self.singletons
            .write()
            .insert(name.into(), Arc::new(service) as SharedService);
        self
    }

    /// Register a factory producing a fresh instance per resolve
    pub fn register_factory<T, F>(&self, name: impl Into<String>, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let factory: ServiceFactory = Arc::new(move || {
            let service = factory()?;
            Ok(Arc::new(service) as SharedService)
        });
        self.factories.write().insert(name.into(), factory);
        self
    }

    /// Resolve a service by name
    pub fn resolve<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        if let Some(service) = self.singletons.read().get(name).cloned() {
            return service.downcast::<T>().map_err(|_| type_mismatch::<T>(name));
        }

        // Clone the factory out so it runs without the lock held
        let factory = self.factories.read().get(name).cloned();
        match factory {
            Some(factory) => factory()?
                .downcast::<T>()
                .map_err(|_| type_mismatch::<T>(name)),
            None => Err(BeaconError::Service(format!("Service not found: {}", name))),
        }
    }

    /// Check if a service is registered
    pub fn has(&self, name: &str) -> bool {
        self.singletons.read().contains_key(name) || self.factories.read().contains_key(name)
    }

    /// Names of every registered service, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .singletons
            .read()
            .keys()
            .chain(self.factories.read().keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn type_mismatch<T>(name: &str) -> BeaconError {
    BeaconError::Service(format!(
        "Service '{}' is not a {}",
        name,
        std::any::type_name::<T>()
    ))
}
