//! Subsystem abstraction.
//!
//! # Responsibilities
//! - Common `start` / `stop(timeout)` contract for process-lifetime components
//! - Per-subsystem bookkeeping (kind, start time, state) owned by the coordinator
//!
//! # Design Decisions
//! - `start` and `stop` each run at most once; the handle enforces it so
//!   implementations only need to handle the happy sequence
//! - `stop` on a subsystem that never started is a no-op, not an error

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// The kinds of subsystem the service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsystemKind {
    /// Metrics scrape endpoint.
    Monitoring,
    /// Span export pipeline.
    TracingClient,
    /// Request-serving HTTP listener.
    Listener,
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubsystemKind::Monitoring => "monitoring",
            SubsystemKind::TracingClient => "tracing-client",
            SubsystemKind::Listener => "listener",
        })
    }
}

/// Errors raised while starting or stopping a subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SubsystemError {
    /// Bind address could not be parsed.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Failed to bind a listening socket.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Did not finish stopping within its budget.
    #[error("did not stop within {0:?}")]
    Timeout(Duration),

    /// A background task panicked or returned an error.
    #[error("background task failed: {0}")]
    Task(String),
}

/// A component that is brought up once and torn down once.
#[async_trait]
pub trait Subsystem: Send {
    fn kind(&self) -> SubsystemKind;

    /// Bring the subsystem up. Returns once it is ready to serve.
    async fn start(&mut self) -> Result<(), SubsystemError>;

    /// Tear the subsystem down, giving up after `timeout`.
    async fn stop(&mut self, timeout: Duration) -> Result<(), SubsystemError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Registered,
    Started,
    Stopped,
}

/// A subsystem as owned by the coordinator.
pub struct SubsystemHandle {
    kind: SubsystemKind,
    started_at: Option<Instant>,
    state: HandleState,
    inner: Box<dyn Subsystem>,
}

impl SubsystemHandle {
    pub fn new(inner: Box<dyn Subsystem>) -> Self {
        Self {
            kind: inner.kind(),
            started_at: None,
            state: HandleState::Registered,
            inner,
        }
    }

    pub fn kind(&self) -> SubsystemKind {
        self.kind
    }

    /// When `start` returned successfully.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn is_running(&self) -> bool {
        self.state == HandleState::Started
    }

    /// Start the subsystem unless a start was already attempted.
    pub async fn start(&mut self) -> Result<(), SubsystemError> {
        if self.state != HandleState::Registered {
            tracing::warn!(subsystem = %self.kind, "Ignoring repeated start");
            return Ok(());
        }
        // A failed start still counts as the one attempt.
        self.state = HandleState::Stopped;
        self.inner.start().await?;
        self.state = HandleState::Started;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// Stop the subsystem if it is running; otherwise do nothing.
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), SubsystemError> {
        if self.state != HandleState::Started {
            return Ok(());
        }
        self.state = HandleState::Stopped;
        self.inner.stop(timeout).await
    }
}

impl fmt::Debug for SubsystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsystemHandle")
            .field("kind", &self.kind)
            .field("started_at", &self.started_at)
            .field("state", &self.state)
            .finish()
    }
}
