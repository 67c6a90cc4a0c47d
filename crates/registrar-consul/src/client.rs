//! The registry seam consumed by the reconciler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use registrar_core::{RegisteredService, RegistrationRecord, ServiceId};

use crate::error::RegistryResult;

/// Network-facing operations against a service registry.
///
/// Implementations must be safe to call concurrently; the reconciler may
/// process several services at once over one client.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Current registrations, keyed by service id.
    async fn list_registrations(&self) -> RegistryResult<HashMap<ServiceId, RegisteredService>>;

    /// Register or overwrite a service by id.
    async fn submit_registration(&self, record: &RegistrationRecord) -> RegistryResult<()>;

    /// Remove a service by id.
    async fn deregister(&self, id: &str) -> RegistryResult<()>;

    /// Address the registry agent advertises for itself.
    async fn self_address(&self) -> RegistryResult<String>;

    /// Address of the current cluster leader.
    async fn current_leader(&self) -> RegistryResult<String>;
}

#[async_trait]
impl<T: RegistryClient + ?Sized> RegistryClient for Arc<T> {
    async fn list_registrations(&self) -> RegistryResult<HashMap<ServiceId, RegisteredService>> {
        (**self).list_registrations().await
    }

    async fn submit_registration(&self, record: &RegistrationRecord) -> RegistryResult<()> {
        (**self).submit_registration(record).await
    }

    async fn deregister(&self, id: &str) -> RegistryResult<()> {
        (**self).deregister(id).await
    }

    async fn self_address(&self) -> RegistryResult<String> {
        (**self).self_address().await
    }

    async fn current_leader(&self) -> RegistryResult<String> {
        (**self).current_leader().await
    }
}
