//! Reconciliation loop and reconciler assembly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use serde_json::json;

use registrar_check::{
    AttributeResolver, CheckBuilder, EnvLookup, EnvOverrides, MapEnv, ProcessEnv,
};
use registrar_consul::{ConsulClient, MemoryRegistry, Reconciler, RegistryClient};
use registrar_core::{IpMode, RegistrarConfig, ServiceDescriptor};

/// Address the dry-run registry reports for itself.
const DRY_RUN_ADDRESS: &str = "127.0.0.1";

pub type DynReconciler = Reconciler<Arc<dyn RegistryClient>>;

/// Check attribute chain: service attributes, process environment, then
/// the `[check_env]` table from the config file.
pub fn build_resolver(config: &RegistrarConfig) -> AttributeResolver {
    build_resolver_with(ProcessEnv, config)
}

/// Same chain as [`build_resolver`] with `env` standing in for the
/// process environment.
pub fn build_resolver_with<E: EnvLookup + 'static>(
    env: E,
    config: &RegistrarConfig,
) -> AttributeResolver {
    AttributeResolver::with_env(env).push_tier(Box::new(EnvOverrides::new(MapEnv::new(
        config.check_env.clone(),
    ))))
}

/// Derive each service's check without registering anything.
///
/// Services that defer their address to the agent keep the `backend`
/// placeholder and are flagged `unresolved` unless `self_address` is given.
pub fn derive_checks(
    checks: &CheckBuilder,
    services: &[ServiceDescriptor],
    self_address: Option<&str>,
) -> serde_json::Map<String, serde_json::Value> {
    services
        .iter()
        .map(|svc| {
            let svc = match (&svc.ip, self_address) {
                (IpMode::ResolveViaRegistryHost, Some(addr)) => svc.clone().with_ip(addr),
                _ => svc.clone(),
            };
            let unresolved = svc.ip == IpMode::ResolveViaRegistryHost;
            let entry = json!({
                "address": svc.ip.to_string(),
                "unresolved": unresolved,
                "check": checks.build(&svc),
            });
            (svc.id, entry)
        })
        .collect()
}

/// Assemble a reconciler against Consul, or against an in-memory
/// registry when `dry_run` is set.
pub fn build_reconciler(config: &RegistrarConfig, dry_run: bool) -> anyhow::Result<DynReconciler> {
    let client: Arc<dyn RegistryClient> = if dry_run {
        info!("dry run: registrations are kept in memory");
        Arc::new(MemoryRegistry::new(DRY_RUN_ADDRESS))
    } else {
        let client = ConsulClient::new(&config.consul)?;
        info!(agent = %client.base_url(), "consul client initialized");
        Arc::new(client)
    };

    Ok(Reconciler::new(client, CheckBuilder::new(build_resolver(config))))
}

/// Run reconciliation cycles every `interval` until `shutdown` flips.
///
/// The first cycle starts immediately. Returns the number of cycles run.
pub async fn run<C: RegistryClient>(
    reconciler: &Reconciler<C>,
    services: &[ServiceDescriptor],
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut cycles = 0u64;

    info!(services = services.len(), ?interval, "reconciliation loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let stats = reconciler.reconcile(services).await;
        cycles += 1;
        debug!(cycle = cycles, ?stats, "cycle finished");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                debug!("reconciliation loop shutting down");
                break;
            }
        }
    }

    info!(cycles, "reconciliation loop stopped");
    cycles
}
