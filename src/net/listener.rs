//! TCP listener and background serving task.
//!
//! # Responsibilities
//! - Bind to configured address
//! - Serve an Axum router on a background task
//! - Graceful stop: stop accepting, drain, then cut off after a deadline
//!
//! # Design Decisions
//! - Bind happens in `start` so a busy port is a startup failure
//! - Draining ends `CANCEL_SETTLE` before the caller's timeout; in-flight
//!   requests are then cut off through the cancellation token (the router
//!   answers them with 503) and the serving task is aborted
//! - If `shutdown` itself is dropped part-way, its guards still cancel the
//!   token and abort the task

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::lifecycle::subsystem::SubsystemError;

/// Time cut-off requests get to write their response before the task is aborted.
pub const CANCEL_SETTLE: Duration = Duration::from_millis(50);

/// Bind a TCP listener on `address`.
pub async fn bind(address: &str) -> Result<TcpListener, SubsystemError> {
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
        SubsystemError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })?;

    let listener = TcpListener::bind(addr).await.map_err(|source| SubsystemError::Bind {
        address: address.to_string(),
        source,
    })?;

    if let Ok(local_addr) = listener.local_addr() {
        tracing::info!(address = %local_addr, "Listener bound");
    }
    Ok(listener)
}

/// A router being served on a background task.
///
/// Dropping it aborts the serving task.
pub struct ServerTask {
    local_addr: SocketAddr,
    stop_tx: oneshot::Sender<()>,
    cancel: CancellationToken,
    join: AbortOnDropHandle<std::io::Result<()>>,
}

impl ServerTask {
    /// Serve `router` on `listener` until [`ServerTask::shutdown`] is called.
    ///
    /// `cancel` is cancelled if draining overruns its deadline.
    pub fn spawn(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<Self, SubsystemError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| SubsystemError::Task(format!("listener has no local address: {}", e)))?;
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let join = AbortOnDropHandle::new(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        }));

        Ok(Self {
            local_addr,
            stop_tx,
            cancel,
            join,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, drain in-flight requests, and give up after `timeout`.
    ///
    /// Everything, the cut-off included, happens within `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), SubsystemError> {
        let ServerTask {
            local_addr,
            stop_tx,
            cancel,
            mut join,
        } = self;
        // Fires on every exit path, including this future being dropped.
        let cut_off = cancel.drop_guard();
        let _ = stop_tx.send(());

        let drain = timeout.saturating_sub(CANCEL_SETTLE);
        match tokio::time::timeout(drain, &mut join).await {
            Ok(result) => {
                cut_off.disarm();
                match result {
                    Ok(Ok(())) => {
                        tracing::debug!(address = %local_addr, "Server drained");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(SubsystemError::Task(format!("server error: {}", e))),
                    Err(e) => Err(SubsystemError::Task(format!("server task failed: {}", e))),
                }
            }
            Err(_) => {
                tracing::warn!(address = %local_addr, ?timeout, "Drain timed out, cutting off in-flight requests");
                drop(cut_off);
                let _ = tokio::time::timeout(timeout.saturating_sub(drain), &mut join).await;
                join.abort();
                Err(SubsystemError::Timeout(timeout))
            }
        }
    }
}

impl fmt::Debug for ServerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTask")
            .field("local_addr", &self.local_addr)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
