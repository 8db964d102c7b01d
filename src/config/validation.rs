//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (timeouts > 0, capacities > 0)
//! - Detect conflicting listeners
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = parse_addr(&config.listener.bind_address, "listener.bind_address", &mut errors);
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }
    if config.observability.metrics_enabled {
        let metrics = parse_addr(
            &config.observability.metrics_address,
            "observability.metrics_address",
            &mut errors,
        );
        if let (Some(listener), Some(metrics)) = (listener, metrics) {
            if listener == metrics && listener.port() != 0 {
                errors.push(ValidationError::new(
                    "observability.metrics_address",
                    format!("conflicts with listener.bind_address ({})", listener),
                ));
            }
        }
    }

    if config.tracing.service_name.trim().is_empty() {
        errors.push(ValidationError::new("tracing.service_name", "must not be empty"));
    }
    if config.tracing.queue_capacity == 0 {
        errors.push(ValidationError::new("tracing.queue_capacity", "must be greater than 0"));
    }

    if config.lifecycle.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "lifecycle.shutdown_timeout_secs",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_addr(value: &str, field: &'static str, errors: &mut Vec<ValidationError>) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new(field, format!("invalid socket address {:?}: {}", value, e)));
            None
        }
    }
}
