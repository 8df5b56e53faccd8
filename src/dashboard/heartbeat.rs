//! Periodic registration ping against the control plane.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::dashboard::client::{DashboardClient, DashboardError, NodeIdentity};

/// Keeps this node's registration alive.
pub struct Heartbeat {
    client: Arc<DashboardClient>,
    interval: Duration,
    suspended: Arc<AtomicBool>,
}

/// Control handle for a running heartbeat.
#[derive(Clone)]
pub struct HeartbeatHandle {
    client: Arc<DashboardClient>,
    suspended: Arc<AtomicBool>,
}

impl HeartbeatHandle {
    /// Stop pinging and return the identity so another process can resume it.
    pub fn suspend(&self) -> NodeIdentity {
        self.suspended.store(true, Ordering::Release);
        let identity = self.client.identity();
        tracing::info!(node_id = %identity.node_id, "Heartbeat suspended");
        identity
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Release);
        tracing::info!("Heartbeat resumed");
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }
}

impl Heartbeat {
    pub fn new(client: Arc<DashboardClient>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            suspended: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> HeartbeatHandle {
        HeartbeatHandle {
            client: self.client.clone(),
            suspended: self.suspended.clone(),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Control plane heartbeat started");
        loop {
            // Spread pings from many nodes.
            let spread = self.interval.as_millis() as u64 / 10;
            let jitter = Duration::from_millis(fastrand::u64(0..=spread));
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval + jitter) => {}
            }

            if self.suspended.load(Ordering::Acquire) {
                continue;
            }

            match self.client.heartbeat().await {
                Ok(()) => tracing::debug!("Heartbeat ok"),
                Err(DashboardError::Forbidden) => {
                    tracing::warn!("Heartbeat rejected, registering again");
                    if let Err(e) = self.client.register().await {
                        tracing::error!(error = %e, "Re-registration failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Heartbeat failed"),
            }
        }
        tracing::info!("Control plane heartbeat stopped");
    }
}
