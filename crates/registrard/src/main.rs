//! registrard — the registrar daemon.
//!
//! Keeps a Consul agent's service catalog in line with a set of
//! discovered services and derives each service's health check from its
//! `check_*` attributes.
//!
//! # Usage
//!
//! ```text
//! registrard --config /etc/registrard.toml run
//! registrard --config /etc/registrard.toml ping
//! registrard --config /etc/registrard.toml deregister web-1
//! registrard --config /etc/registrard.toml check --resolve
//! ```

mod daemon;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use registrar_consul::RegistryClient;
use registrar_core::RegistrarConfig;

#[derive(Parser)]
#[command(name = "registrard", about = "Consul registrar daemon", version)]
struct Cli {
    /// Path to registrard.toml.
    #[arg(short, long, default_value = "/etc/registrard.toml", env = "REGISTRARD_CONFIG")]
    config: PathBuf,

    /// Override the Consul agent address (host:port).
    #[arg(long, env = "CONSUL_HTTP_ADDR")]
    consul_address: Option<String>,

    /// Override the Consul ACL token.
    #[arg(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    consul_token: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile configured services with Consul until interrupted.
    Run {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,

        /// Keep registrations in memory instead of talking to Consul.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that the Consul agent is reachable and has a leader.
    Ping,
    /// Print the services currently registered with the agent.
    List,
    /// Remove a service from the agent by id.
    Deregister {
        /// Service id.
        id: String,
    },
    /// Print the health check derived for each configured service.
    ///
    /// Services whose address comes from the agent show the `backend`
    /// placeholder and `"unresolved": true`. Pass `--resolve` to ask the
    /// agent for its address and substitute it.
    Check {
        /// Look up the agent's own address for `backend` services.
        #[arg(long)]
        resolve: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    let mut config = RegistrarConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(address) = cli.consul_address {
        config.consul.address = address;
    }
    if let Some(token) = cli.consul_token {
        config.consul.token = Some(token);
    }

    match cli.command {
        Command::Run { once, dry_run } => run(config, once, dry_run).await,
        Command::Ping => {
            let reconciler = daemon::build_reconciler(&config, false)?;
            let leader = reconciler.ping().await.context("consul ping failed")?;
            println!("{leader}");
            Ok(())
        }
        Command::List => {
            let reconciler = daemon::build_reconciler(&config, false)?;
            let services = reconciler.services().await?;
            println!("{}", serde_json::to_string_pretty(&services)?);
            Ok(())
        }
        Command::Deregister { id } => {
            let reconciler = daemon::build_reconciler(&config, false)?;
            reconciler.deregister(&id).await?;
            Ok(())
        }
        Command::Check { resolve } => {
            let reconciler = daemon::build_reconciler(&config, false)?;
            let self_address = if resolve {
                let addr = reconciler
                    .client()
                    .self_address()
                    .await
                    .context("resolving agent address")?;
                Some(addr)
            } else {
                None
            };
            let derived = daemon::derive_checks(
                reconciler.checks(),
                &config.services,
                self_address.as_deref(),
            );
            println!("{}", serde_json::to_string_pretty(&derived)?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,registrard=debug,registrar_consul=debug".into());

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(config: RegistrarConfig, once: bool, dry_run: bool) -> anyhow::Result<()> {
    info!(
        agent = %config.consul.address,
        services = config.services.len(),
        "registrard starting"
    );

    let reconciler = daemon::build_reconciler(&config, dry_run)?;

    if !dry_run {
        let leader = reconciler.ping().await.context("consul ping failed")?;
        info!(%leader, "consul reachable");
    }

    if once {
        let stats = reconciler.reconcile(&config.services).await;
        if stats.failed > 0 {
            anyhow::bail!("{} of {} registrations failed", stats.failed, config.services.len());
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    daemon::run(&reconciler, &config.services, config.sync.interval(), shutdown_rx).await;

    info!("registrard stopped");
    Ok(())
}
