//! Registration reconciler — decides skip or register per service.
//!
//! For every descriptor the reconciler resolves the advertised address,
//! compares against the registry's current snapshot, and only writes when
//! the registry's entry differs in name, address or port. Nothing is kept
//! between calls; each decision is made from a fresh snapshot.

use tracing::{debug, error, info, warn};

use registrar_check::CheckBuilder;
use registrar_core::{IpMode, RegistrationRecord, ServiceDescriptor};

use crate::client::RegistryClient;
use crate::error::RegistryResult;

/// What `register` did for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The registry already had a matching entry; nothing was sent.
    Skipped,
    /// A full registration was submitted.
    Submitted,
}

/// Per-cycle statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub submitted: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Keeps registry entries in line with discovered services.
pub struct Reconciler<C> {
    client: C,
    checks: CheckBuilder,
}

impl<C: RegistryClient> Reconciler<C> {
    pub fn new(client: C, checks: CheckBuilder) -> Self {
        Self { client, checks }
    }

    /// Access the underlying registry client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Access the check builder.
    pub fn checks(&self) -> &CheckBuilder {
        &self.checks
    }

    /// Resolve the descriptor's address and build its registration, or
    /// return `None` when the registry already holds a matching entry.
    pub async fn plan(&self, descriptor: &ServiceDescriptor) -> RegistryResult<Option<RegistrationRecord>> {
        let service = self.resolve_address(descriptor).await?;
        let address = service.ip.to_string();

        let snapshot = self.client.list_registrations().await?;
        if let Some(existing) = snapshot.get(&service.id) {
            if existing.matches(&service.name, &address, service.port) {
                info!(id = %service.id, "service already registered, skipped");
                return Ok(None);
            }
            debug!(
                id = %service.id,
                registered = %format!("{}@{}:{}", existing.service, existing.address, existing.port),
                wanted = %format!("{}@{}:{}", service.name, address, service.port),
                "registered entry differs"
            );
        }

        let check = self.checks.build(&service);
        Ok(Some(RegistrationRecord::new(&service, &address, check)))
    }

    /// Register a service unless the registry already has it.
    pub async fn register(&self, descriptor: &ServiceDescriptor) -> RegistryResult<RegisterOutcome> {
        let Some(record) = self.plan(descriptor).await? else {
            return Ok(RegisterOutcome::Skipped);
        };

        self.client.submit_registration(&record).await?;

        info!(
            id = %record.id,
            name = %record.name,
            address = %record.address,
            port = record.port,
            check = record.check.as_ref().map(|c| c.kind.label()).unwrap_or("none"),
            "service registered"
        );

        Ok(RegisterOutcome::Submitted)
    }

    /// Remove a service from the registry. Always issued.
    pub async fn deregister(&self, id: &str) -> RegistryResult<()> {
        self.client.deregister(id).await?;
        info!(%id, "service deregistered");
        Ok(())
    }

    /// Refresh is a no-op: the registry runs its own checks.
    pub async fn refresh(&self, descriptor: &ServiceDescriptor) -> RegistryResult<()> {
        debug!(id = %descriptor.id, "refresh requested, nothing to do");
        Ok(())
    }

    /// Services currently in the registry, sorted by id.
    ///
    /// The registry does not store attributes or origin, so those come
    /// back empty.
    pub async fn services(&self) -> RegistryResult<Vec<ServiceDescriptor>> {
        let mut services: Vec<ServiceDescriptor> = self
            .client
            .list_registrations()
            .await?
            .into_values()
            .map(|entry| entry.into_descriptor())
            .collect();
        services.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(services)
    }

    /// Liveness probe for the registry connection: asks for the leader.
    pub async fn ping(&self) -> RegistryResult<String> {
        let leader = self.client.current_leader().await?;
        if leader.is_empty() {
            warn!("registry reachable but reports no leader");
        }
        Ok(leader)
    }

    /// Run one reconciliation cycle over `descriptors`.
    ///
    /// Services are handled independently: a failure is logged and
    /// counted, and the remaining services are still processed.
    pub async fn reconcile(&self, descriptors: &[ServiceDescriptor]) -> CycleStats {
        let mut stats = CycleStats::default();

        for descriptor in descriptors {
            match self.register(descriptor).await {
                Ok(RegisterOutcome::Submitted) => stats.submitted += 1,
                Ok(RegisterOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    error!(id = %descriptor.id, error = %e, "registration failed");
                    stats.failed += 1;
                }
            }
        }

        info!(
            submitted = stats.submitted,
            skipped = stats.skipped,
            failed = stats.failed,
            "reconciliation cycle complete"
        );

        stats
    }

    async fn resolve_address(&self, descriptor: &ServiceDescriptor) -> RegistryResult<ServiceDescriptor> {
        match &descriptor.ip {
            IpMode::Literal(_) => Ok(descriptor.clone()),
            IpMode::ResolveViaRegistryHost => {
                let addr = self.client.self_address().await?;
                debug!(id = %descriptor.id, %addr, "resolved address via registry host");
                Ok(descriptor.clone().with_ip(addr))
            }
        }
    }
}
