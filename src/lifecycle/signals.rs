//! OS signal handling.
//!
//! # Responsibilities
//! - Install SIGINT and SIGTERM handlers before the service starts
//! - Translate signals into the process [`Shutdown`] trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers that cannot be installed are a startup failure: a service that
//!   cannot be told to stop must not start
//! - The coordinator never sees signals directly, only the trigger
//! - Repeated signals are logged and otherwise ignored

use std::io;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::startup::StartupError;

/// A source of termination requests.
#[async_trait]
pub trait SignalSource: Send + 'static {
    /// Wait for the next termination request and return its name.
    /// `None` once the source can deliver no more.
    async fn next(&mut self) -> Option<&'static str>;
}

/// SIGTERM and SIGINT (Ctrl+C off Unix), installed up front.
#[derive(Debug)]
pub struct TerminationSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl TerminationSignals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(windows)]
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }
}

#[async_trait]
impl SignalSource for TerminationSignals {
    #[cfg(unix)]
    async fn next(&mut self) -> Option<&'static str> {
        tokio::select! {
            Some(()) = self.terminate.recv() => Some("SIGTERM"),
            Some(()) = self.interrupt.recv() => Some("SIGINT"),
            else => None,
        }
    }

    #[cfg(windows)]
    async fn next(&mut self) -> Option<&'static str> {
        self.ctrl_c.recv().await.map(|()| "ctrl-c")
    }
}

/// Install the OS termination handlers and fire `shutdown` on each signal.
pub fn install_signal_listener(shutdown: Shutdown) -> Result<JoinHandle<()>, StartupError> {
    install_with(TerminationSignals::install, shutdown)
}

/// Install a signal source with `install` and listen on it.
pub fn install_with<S, F>(install: F, shutdown: Shutdown) -> Result<JoinHandle<()>, StartupError>
where
    S: SignalSource,
    F: FnOnce() -> io::Result<S>,
{
    let source = install().map_err(StartupError::Signals)?;
    tracing::debug!("Signal handlers installed");
    Ok(spawn_signal_listener(source, shutdown))
}

/// Spawn a task that fires `shutdown` on every signal from `source`.
pub fn spawn_signal_listener<S: SignalSource>(mut source: S, shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = source.next().await {
            if shutdown.trigger() {
                tracing::warn!(signal, "Termination signal received, shutting down");
            } else {
                tracing::warn!(signal, "Termination signal received, shutdown already in progress");
            }
        }
        tracing::warn!("Signal source closed, no further signals will be handled");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::lifecycle::startup::EXIT_SIGNALS;

    struct ChannelSignals(mpsc::Receiver<&'static str>);

    #[async_trait]
    impl SignalSource for ChannelSignals {
        async fn next(&mut self) -> Option<&'static str> {
            self.0.recv().await
        }
    }

    #[tokio::test]
    async fn install_failure_is_a_startup_error() {
        let err = install_with(
            || -> io::Result<ChannelSignals> { Err(io::Error::other("signal driver unavailable")) },
            Shutdown::new(),
        )
        .unwrap_err();

        assert!(matches!(err, StartupError::Signals(_)));
        assert_eq!(err.exit_code(), EXIT_SIGNALS);
    }

    #[tokio::test]
    async fn signals_fire_the_trigger_once() {
        let (tx, rx) = mpsc::channel(4);
        let shutdown = Shutdown::new();
        let task = install_with(|| Ok(ChannelSignals(rx)), shutdown.clone()).unwrap();

        tx.send("SIGTERM").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown.triggered())
            .await
            .expect("trigger should fire");

        // A second signal is absorbed; closing the source ends the task.
        tx.send("SIGINT").await.unwrap();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("listener should exit")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn os_handlers_install() {
        let task = install_signal_listener(Shutdown::new()).unwrap();
        task.abort();
    }
}
