//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the metrics recorder, tracing client and product service from
//!   configuration and thread their handles into the request path
//! - Register subsystems in dependency order: monitoring, tracing client,
//!   listener
//! - Map startup failures to process exit codes
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use crate::config::{ConfigError, ServiceConfig};
use crate::http::HttpServer;
use crate::lifecycle::coordinator::Coordinator;
use crate::lifecycle::subsystem::{SubsystemError, SubsystemKind};
use crate::observability::{LoggingError, MetricsRecorder, MonitoringServer};
use crate::products::ProductService;
use crate::store::{DataStore, ProductRepository};
use crate::trace::client::{LogExporter, TracingClient};
use crate::trace::span::Tracer;

/// Exit status for an unusable configuration (`EX_CONFIG`).
pub const EXIT_CONFIG: u8 = 78;
/// Exit status when logging cannot be set up (`EX_SOFTWARE`).
pub const EXIT_LOGGING: u8 = 70;
/// Exit status when a subsystem fails to start (`EX_UNAVAILABLE`).
pub const EXIT_SUBSYSTEM_START: u8 = 69;
/// Exit status when termination handlers cannot be installed (`EX_OSERR`).
pub const EXIT_SIGNALS: u8 = 71;

/// Fatal error before the service reached `Running`.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("{kind} failed to start: {source}")]
    Subsystem {
        kind: SubsystemKind,
        #[source]
        source: SubsystemError,
    },
}

impl StartupError {
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::Config(_) => EXIT_CONFIG,
            StartupError::Logging(_) => EXIT_LOGGING,
            StartupError::Signals(_) => EXIT_SIGNALS,
            StartupError::Subsystem { .. } => EXIT_SUBSYSTEM_START,
        }
    }
}

/// Assemble the coordinator and every subsystem described by `config`.
///
/// Nothing is started; the caller runs the coordinator.
pub fn build_coordinator(config: &ServiceConfig, store: Arc<dyn DataStore>) -> Coordinator {
    let metrics = Arc::new(MetricsRecorder::new());

    let tracing_client = config.tracing.enabled.then(|| {
        TracingClient::new(
            LogExporter::new(config.tracing.service_name.as_str()),
            config.tracing.queue_capacity,
        )
    });
    let tracer = tracing_client
        .as_ref()
        .map(TracingClient::tracer)
        .unwrap_or_else(Tracer::disabled);

    let repo = ProductRepository::new(store, tracer.clone());
    let service = ProductService::new(repo, tracer, metrics.clone(), config.tracing.service_name.as_str());

    let mut coordinator = Coordinator::new(config.lifecycle.shutdown_timeout(), config.lifecycle.grace_period());
    if config.observability.metrics_enabled {
        coordinator.register(Box::new(MonitoringServer::new(
            config.observability.metrics_address.as_str(),
            metrics,
        )));
    }
    if let Some(client) = tracing_client {
        coordinator.register(Box::new(client));
    }
    coordinator.register(Box::new(HttpServer::new(config, service)));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        metrics_enabled = config.observability.metrics_enabled,
        tracing_enabled = config.tracing.enabled,
        "Subsystems assembled"
    );
    coordinator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn kinds(coordinator: &Coordinator) -> Vec<SubsystemKind> {
        coordinator.subsystems().iter().map(|h| h.kind()).collect()
    }

    #[test]
    fn subsystems_registered_in_dependency_order() {
        let coordinator = build_coordinator(&ServiceConfig::default(), Arc::new(MemoryStore::new()));
        assert_eq!(
            kinds(&coordinator),
            vec![
                SubsystemKind::Monitoring,
                SubsystemKind::TracingClient,
                SubsystemKind::Listener
            ]
        );
    }

    #[test]
    fn disabled_subsystems_are_left_out() {
        let mut config = ServiceConfig::default();
        config.observability.metrics_enabled = false;
        config.tracing.enabled = false;

        let coordinator = build_coordinator(&config, Arc::new(MemoryStore::new()));
        assert_eq!(kinds(&coordinator), vec![SubsystemKind::Listener]);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let config = StartupError::Config(ConfigError::Validation(Vec::new()));
        let subsystem = StartupError::Subsystem {
            kind: SubsystemKind::Listener,
            source: SubsystemError::Task("boom".into()),
        };
        let signals = StartupError::Signals(std::io::Error::other("no driver"));
        assert_eq!(config.exit_code(), EXIT_CONFIG);
        assert_eq!(signals.exit_code(), EXIT_SIGNALS);
        assert_eq!(subsystem.exit_code(), EXIT_SUBSYSTEM_START);
        assert_eq!(subsystem.to_string(), "listener failed to start: background task failed: boom");
    }
}
