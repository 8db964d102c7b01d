//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → build subsystems → Coordinator (monitoring, tracing client, listener)
//!
//! Coordinator (coordinator.rs):
//!     start in order → Running → await trigger → stop in reverse → grace → Stopped
//!
//! Signals (signals.rs):
//!     install handlers (failure is fatal) → SIGTERM/SIGINT → Shutdown trigger (shutdown.rs)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: monitoring first, listener last
//! - Ordered shutdown: reverse of startup
//! - Shutdown has one shared budget: no subsystem can extend it

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod subsystem;

pub use coordinator::{Coordinator, LifecycleState, ShutdownReport, StopFailure};
pub use shutdown::Shutdown;
pub use signals::{install_signal_listener, install_with, spawn_signal_listener, SignalSource, TerminationSignals};
pub use startup::{build_coordinator, StartupError, EXIT_CONFIG, EXIT_LOGGING, EXIT_SIGNALS, EXIT_SUBSYSTEM_START};
pub use subsystem::{Subsystem, SubsystemError, SubsystemHandle, SubsystemKind};
