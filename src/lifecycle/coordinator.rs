//! Lifecycle coordinator.
//!
//! ```text
//! Idle → Starting → Running → Stopping → Stopped
//!           │                               ▲
//!           └──── start failure (rollback) ─┘
//! ```
//!
//! Subsystems start in registration order and stop in reverse. One shutdown
//! budget is shared by every stop of a pass; the remaining budget shrinks as
//! stops complete. Stop errors are logged and collected, never propagated.

use std::time::{Duration, Instant};

use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::startup::StartupError;
use crate::lifecycle::subsystem::{Subsystem, SubsystemError, SubsystemHandle, SubsystemKind};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// A subsystem whose stop did not succeed.
#[derive(Debug)]
pub struct StopFailure {
    pub kind: SubsystemKind,
    pub error: SubsystemError,
}

/// Outcome of a shutdown pass.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Subsystems stopped cleanly, in stop order.
    pub stopped: Vec<SubsystemKind>,
    /// Subsystems whose stop failed or overran the budget.
    pub failures: Vec<StopFailure>,
    /// Time from entering `Stopping` to `Stopped`, grace period included.
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Supervises subsystem startup and bounded, best-effort shutdown.
pub struct Coordinator {
    state: LifecycleState,
    subsystems: Vec<SubsystemHandle>,
    shutdown_budget: Duration,
    grace_period: Duration,
    shutdown: Shutdown,
}

impl Coordinator {
    pub fn new(shutdown_budget: Duration, grace_period: Duration) -> Self {
        Self {
            state: LifecycleState::Idle,
            subsystems: Vec::new(),
            shutdown_budget,
            grace_period,
            shutdown: Shutdown::new(),
        }
    }

    /// Register the next subsystem. Registration order is dependency order:
    /// each subsystem may rely on every one registered before it.
    pub fn with_subsystem(mut self, subsystem: impl Subsystem + 'static) -> Self {
        self.register(Box::new(subsystem));
        self
    }

    pub fn register(&mut self, subsystem: Box<dyn Subsystem>) {
        if self.state != LifecycleState::Idle {
            tracing::warn!(
                subsystem = %subsystem.kind(),
                state = ?self.state,
                "Subsystem registered after startup, it will not be started"
            );
        }
        self.subsystems.push(SubsystemHandle::new(subsystem));
    }

    /// Trigger that moves a running coordinator to `Stopping`.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn subsystems(&self) -> &[SubsystemHandle] {
        &self.subsystems
    }

    /// Start every registered subsystem in order.
    ///
    /// On the first failure the subsystems already started are stopped again
    /// (reverse order, shared budget), the coordinator ends in `Stopped` and
    /// the failure is returned. Nothing after the failed subsystem is started.
    pub async fn start(&mut self) -> Result<(), StartupError> {
        if self.state != LifecycleState::Idle {
            tracing::warn!(state = ?self.state, "Coordinator already started");
            return Ok(());
        }
        self.state = LifecycleState::Starting;

        for index in 0..self.subsystems.len() {
            let handle = &mut self.subsystems[index];
            let kind = handle.kind();
            tracing::debug!(subsystem = %kind, "Starting subsystem");

            if let Err(source) = handle.start().await {
                tracing::error!(subsystem = %kind, error = %source, "Subsystem failed to start");
                self.state = LifecycleState::Stopping;
                let rollback = self.stop_all().await;
                if !rollback.is_clean() {
                    tracing::warn!(
                        failures = rollback.failures.len(),
                        "Rollback after failed startup was incomplete"
                    );
                }
                self.state = LifecycleState::Stopped;
                return Err(StartupError::Subsystem { kind, source });
            }
            tracing::info!(subsystem = %kind, "Subsystem started");
        }

        self.state = LifecycleState::Running;
        tracing::info!(subsystems = self.subsystems.len(), "All subsystems running");
        Ok(())
    }

    /// Wait until shutdown has been requested.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.triggered().await;
    }

    /// Stop every running subsystem in reverse order, then wait out the
    /// grace period.
    ///
    /// Only the first call on a running coordinator stops anything; later
    /// calls return an empty report.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        match self.state {
            LifecycleState::Running => {}
            LifecycleState::Idle => {
                self.state = LifecycleState::Stopped;
                return ShutdownReport::default();
            }
            state => {
                tracing::debug!(?state, "Shutdown already handled");
                return ShutdownReport::default();
            }
        }

        // A direct call counts as the trigger.
        self.shutdown.trigger();
        self.state = LifecycleState::Stopping;
        tracing::warn!(
            budget = ?self.shutdown_budget,
            grace = ?self.grace_period,
            "Stopping subsystems"
        );

        let began = Instant::now();
        let mut report = self.stop_all().await;

        tokio::time::sleep(self.grace_period).await;
        report.elapsed = began.elapsed();
        self.state = LifecycleState::Stopped;

        tracing::info!(
            stopped = report.stopped.len(),
            failed = report.failures.len(),
            elapsed = ?report.elapsed,
            "Shutdown finished"
        );
        report
    }

    /// Start, wait for the trigger, shut down.
    pub async fn run(mut self) -> Result<ShutdownReport, StartupError> {
        self.start().await?;
        let trigger = self.shutdown.clone();
        trigger.triggered().await;
        Ok(self.shutdown().await)
    }

    async fn stop_all(&mut self) -> ShutdownReport {
        let deadline = Instant::now() + self.shutdown_budget;
        let mut report = ShutdownReport::default();

        for handle in self.subsystems.iter_mut().rev() {
            if !handle.is_running() {
                continue;
            }
            let kind = handle.kind();
            let remaining = deadline.saturating_duration_since(Instant::now());

            // The outer timeout enforces the budget even if a subsystem
            // ignores the one it is given.
            let outcome = match tokio::time::timeout(remaining, handle.stop(remaining)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SubsystemError::Timeout(remaining)),
            };

            match outcome {
                Ok(()) => {
                    tracing::info!(subsystem = %kind, "Subsystem stopped");
                    report.stopped.push(kind);
                }
                Err(error) => {
                    tracing::error!(subsystem = %kind, error = %error, "Subsystem failed to stop");
                    report.failures.push(StopFailure { kind, error });
                }
            }
        }
        report
    }
}
