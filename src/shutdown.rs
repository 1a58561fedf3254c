//! Graceful shutdown handling for Modelwatch.
//!
//! One [`ShutdownCoordinator`] is shared by the monitor's background tasks,
//! the HTTP server, and the `run` loop. Triggering it is idempotent.

use crate::error::{ModelwatchError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::info;

/// Time allowed for the server and monitor to stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Distributes a single shutdown signal.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    /// Fires once for loops selecting on a receiver.
    shutdown_tx: broadcast::Sender<()>,
    /// Latched state for late subscribers.
    state_tx: Arc<watch::Sender<bool>>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (state_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            state_tx: Arc::new(state_tx),
            timeout,
        }
    }

    /// Subscribe to the shutdown broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.state_tx.borrow()
    }

    /// Initiate shutdown; later calls are no-ops.
    pub fn shutdown(&self) {
        let first = self.state_tx.send_if_modified(|state| {
            if *state {
                false
            } else {
                *state = true;
                true
            }
        });
        if first {
            info!("Initiating graceful shutdown");
            let _ = self.shutdown_tx.send(());
        }
    }

    /// A future resolving once shutdown has been initiated, even if it
    /// already was when the future was created.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.state_tx.subscribe();
        async move {
            // A dropped sender counts as shutdown
            let _ = rx.wait_for(|down| *down).await;
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns OS signals into a coordinator shutdown.
pub struct SignalHandler {
    coordinator: ShutdownCoordinator,
}

impl SignalHandler {
    pub fn new(coordinator: ShutdownCoordinator) -> Self {
        Self { coordinator }
    }

    /// Wait for SIGINT or SIGTERM, then trigger shutdown.
    #[cfg(unix)]
    pub async fn run(self) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let install = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| {
                ModelwatchError::Internal(format!("Failed to install {} handler: {}", name, e))
            })
        };
        let mut sigterm = install(SignalKind::terminate(), "SIGTERM")?;
        let mut sigint = install(SignalKind::interrupt(), "SIGINT")?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = self.coordinator.signalled() => return Ok(()),
        }

        self.coordinator.shutdown();
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn run(self) -> Result<()> {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| {
                    ModelwatchError::Internal(format!("Failed to install Ctrl+C handler: {}", e))
                })?;
                info!("Received Ctrl+C");
            }
            _ = self.coordinator.signalled() => return Ok(()),
        }
        self.coordinator.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_broadcast() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        assert!(!coordinator.is_shutting_down());

        coordinator.shutdown();
        assert!(coordinator.is_shutting_down());
        rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        coordinator.shutdown();
        coordinator.shutdown();

        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_signalled_after_the_fact() {
        let coordinator = ShutdownCoordinator::with_timeout(Duration::from_secs(1));
        coordinator.shutdown();
        tokio::time::timeout(Duration::from_secs(1), coordinator.signalled())
            .await
            .unwrap();
        assert_eq!(coordinator.timeout(), Duration::from_secs(1));
    }
}
