//! Product REST service.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                     PRODUCT SERVICE                       │
//!                    │                                                           │
//!   Client Request   │  ┌─────────┐    ┌─────────┐    ┌──────────┐    ┌───────┐ │
//!   ─────────────────┼─▶│   net   │───▶│  http   │───▶│ products │───▶│ store │ │
//!                    │  │listener │    │ handlers│    │ service  │    │ (db)  │ │
//!                    │  └─────────┘    └─────────┘    └────┬─────┘    └───┬───┘ │
//!                    │                                     │              │     │
//!                    │          handler span ──────────────┘   db span ───┘     │
//!                    │                 │                                        │
//!                    │                 ▼                                        │
//!                    │  ┌──────────────────────┐   ┌──────────────────────────┐ │
//!                    │  │ trace (client queue) │   │ observability (metrics,  │ │
//!                    │  │   → span exporter    │   │   /metrics endpoint)     │ │
//!                    │  └──────────────────────┘   └──────────────────────────┘ │
//!                    │                                                           │
//!                    │  lifecycle: monitoring → tracing client → listener       │
//!                    │             (stopped in reverse on SIGINT/SIGTERM)        │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use product_service::config::{load_config, ServiceConfig};
use product_service::lifecycle::{build_coordinator, install_signal_listener, ShutdownReport, StartupError};
use product_service::observability::init_logging;
use product_service::store::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "product-service", version, about = "Product REST service")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "PRODUCT_SERVICE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            if !report.is_clean() {
                tracing::warn!(failures = report.failures.len(), "Shutdown finished with errors");
            }
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("product-service: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<ShutdownReport, StartupError> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "product-service starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        shutdown_timeout_secs = config.lifecycle.shutdown_timeout_secs,
        "Configuration loaded"
    );

    let coordinator = build_coordinator(&config, Arc::new(MemoryStore::new()));
    let signals = install_signal_listener(coordinator.shutdown_handle())?;

    let outcome = coordinator.run().await;
    signals.abort();
    outcome
}
