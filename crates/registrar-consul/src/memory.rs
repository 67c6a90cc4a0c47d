//! In-process registry.
//!
//! `MemoryRegistry` implements [`RegistryClient`] over a locked map. The
//! daemon uses it for dry runs; tests use its call counters and failure
//! switches to observe what the reconciler sends.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use registrar_core::{RegisteredService, RegistrationRecord, ServiceId};

use crate::client::RegistryClient;
use crate::error::{RegistryError, RegistryResult};

#[derive(Default)]
struct MemoryState {
    services: HashMap<ServiceId, RegisteredService>,
    records: HashMap<ServiceId, RegistrationRecord>,
    self_address: Option<String>,
    leader: Option<String>,
    offline: bool,
    list_calls: u32,
    submit_calls: u32,
    deregister_calls: u32,
}

/// A registry that lives entirely in memory.
pub struct MemoryRegistry {
    state: Mutex<MemoryState>,
}

impl MemoryRegistry {
    /// Empty registry whose agent reports `self_address` and is its own leader.
    pub fn new(self_address: &str) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                self_address: Some(self_address.to_string()),
                leader: Some(format!("{self_address}:8300")),
                ..Default::default()
            }),
        }
    }

    /// Make `self_address()` fail, as an agent without member info would.
    pub fn without_self_address(self) -> Self {
        self.state.lock().expect("registry lock").self_address = None;
        self
    }

    /// Make `current_leader()` fail.
    pub fn without_leader(self) -> Self {
        self.state.lock().expect("registry lock").leader = None;
        self
    }

    /// Seed an entry as if it had been registered earlier.
    pub fn insert(&self, service: RegisteredService) {
        let mut state = self.state.lock().expect("registry lock");
        state.services.insert(service.id.clone(), service);
    }

    /// While offline, every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().expect("registry lock").offline = offline;
    }

    /// The last record submitted for `id`, including its check.
    pub fn registration(&self, id: &str) -> Option<RegistrationRecord> {
        self.state.lock().expect("registry lock").records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("registry lock").services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_calls(&self) -> u32 {
        self.state.lock().expect("registry lock").list_calls
    }

    pub fn submit_calls(&self) -> u32 {
        self.state.lock().expect("registry lock").submit_calls
    }

    pub fn deregister_calls(&self) -> u32 {
        self.state.lock().expect("registry lock").deregister_calls
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> RegistryResult<T>,
    ) -> RegistryResult<T> {
        let mut state = self.state.lock().expect("registry lock");
        if state.offline {
            return Err(RegistryError::Transport("registry offline".to_string()));
        }
        f(&mut state)
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn list_registrations(&self) -> RegistryResult<HashMap<ServiceId, RegisteredService>> {
        self.with_state(|state| {
            state.list_calls += 1;
            Ok(state.services.clone())
        })
    }

    async fn submit_registration(&self, record: &RegistrationRecord) -> RegistryResult<()> {
        self.with_state(|state| {
            state.submit_calls += 1;
            state
                .services
                .insert(record.id.clone(), RegisteredService::from(record));
            state.records.insert(record.id.clone(), record.clone());
            debug!(id = %record.id, "memory registry: registered");
            Ok(())
        })
    }

    async fn deregister(&self, id: &str) -> RegistryResult<()> {
        self.with_state(|state| {
            state.deregister_calls += 1;
            state.services.remove(id);
            state.records.remove(id);
            Ok(())
        })
    }

    async fn self_address(&self) -> RegistryResult<String> {
        self.with_state(|state| {
            state
                .self_address
                .clone()
                .ok_or_else(|| RegistryError::Resolution("no member address".to_string()))
        })
    }

    async fn current_leader(&self) -> RegistryResult<String> {
        self.with_state(|state| {
            state
                .leader
                .clone()
                .ok_or_else(|| RegistryError::Status {
                    status: 500,
                    body: "No cluster leader".to_string(),
                })
        })
    }
}
