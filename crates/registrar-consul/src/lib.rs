//! registrar-consul — Consul registry adapter.
//!
//! Keeps a Consul agent's service catalog in line with the services
//! discovered locally.
//!
//! # Components
//!
//! - **`client`** — the `RegistryClient` seam the reconciler talks to
//! - **`agent`** — `ConsulClient`, the agent HTTP API implementation
//! - **`memory`** — `MemoryRegistry`, an in-process registry for tests and dry runs
//! - **`wire`** — JSON shapes of the agent API
//! - **`reconciler`** — skip-or-register decisions per service
//!
//! ```text
//! ServiceDescriptor ─► Reconciler ─► resolve address (registry host if needed)
//!                                 ├► list_registrations() ─► unchanged? skip
//!                                 └► CheckBuilder ─► submit_registration()
//! ```

pub mod agent;
pub mod client;
pub mod error;
pub mod memory;
pub mod reconciler;
pub mod wire;

pub use client::RegistryClient;
pub use error::{RegistryError, RegistryResult};
pub use agent::ConsulClient;
pub use memory::MemoryRegistry;
pub use reconciler::{CycleStats, Reconciler, RegisterOutcome};
