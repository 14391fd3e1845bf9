//! Service name and URL registry

use std::sync::Arc;
use std::sync::LazyLock;

use dashmap::DashMap;

use crate::client::Service;
use crate::error::SchemaError;

static GLOBAL: LazyLock<ServiceRegistry> = LazyLock::new(ServiceRegistry::new);

/// Maps service names and base URLs to live services.
///
/// Entities refer to their service by name only and look it up here on
/// demand, so the registry is the single owner-side handle.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static ServiceRegistry {
        &GLOBAL
    }

    /// Registers a service under both its name and its URL.
    pub fn add(&self, service: Arc<Service>) {
        self.services
            .insert(service.url().to_string(), Arc::clone(&service));
        self.services.insert(service.name().to_string(), service);
    }

    /// Looks up a service by name or URL.
    pub fn get(&self, name_or_url: &str) -> Option<Arc<Service>> {
        self.services.get(name_or_url).map(|entry| Arc::clone(entry.value()))
    }

    /// Looks up a service, failing with `UnknownService`.
    pub fn lookup(&self, name_or_url: &str) -> Result<Arc<Service>, SchemaError> {
        self.get(name_or_url).ok_or_else(|| SchemaError::UnknownService {
            name: name_or_url.to_string(),
        })
    }

    /// Removes a service registered under `name`, along with its URL entry.
    pub fn remove(&self, name: &str) {
        if let Some((_, service)) = self.services.remove(name) {
            self.services.remove(service.url());
            self.services.remove(service.name());
        }
    }

    /// Returns the number of keys (names and URLs).
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Drops every registered service.
    pub fn flush(&self) {
        self.services.clear();
    }
}
