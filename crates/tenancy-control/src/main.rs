//! Tenancy control service binary.
//!
//! Runs the control plane for provisioning per-tenant workloads.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tenancy_control::{ControlConfig, ControlService};

/// Tenancy control plane.
#[derive(Parser, Debug)]
#[command(name = "tenancy-control")]
#[command(about = "Provision isolated per-tenant workloads on a shared cluster")]
#[command(version)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialise tracing
    let filter = if cli.verbose {
        "debug,hyper=info,tower=info,kube_client=info"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    info!("tenancy control service starting");

    // Load configuration
    let loaded = match &cli.config {
        Some(path) => ControlConfig::from_file(path),
        None => ControlConfig::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        info!(error = %e, "failed to load config, using defaults");
        ControlConfig::default()
    });

    info!(
        listen_addr = %config.server.listen_addr(),
        namespace_prefix = %config.tenants.namespace_prefix,
        platform_type = ?config.platform.platform_type,
        "configuration loaded"
    );

    ControlService::new(config).run().await?;

    Ok(())
}
