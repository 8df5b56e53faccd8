//! Connection watcher for the management node.
//!
//! # States
//! ```text
//! Connected → (threshold consecutive ping failures) → Emergency
//! Emergency → (first successful ping + login)       → Connected, reload queued
//! any       → (client killed)                       → exit
//! ```
//!
//! While in emergency mode the reload coordinator skips every cycle, so the
//! last published snapshot keeps serving.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::SlaveConfig;
use crate::observability::{metrics, EventBus, GatewayEvent};
use crate::reload::ReloadQueue;
use crate::resilience::Backoff;
use crate::rpc::RpcClient;

const RETRY_BASE: Duration = Duration::from_millis(500);
const RETRY_CAP: Duration = Duration::from_secs(30);

pub struct KeepaliveWatcher {
    client: Arc<RpcClient>,
    queue: ReloadQueue,
    events: EventBus,
    interval: Duration,
    threshold: u32,
}

impl KeepaliveWatcher {
    pub fn new(
        client: Arc<RpcClient>,
        queue: ReloadQueue,
        events: EventBus,
        config: &SlaveConfig,
    ) -> Self {
        Self {
            client,
            queue,
            events,
            interval: Duration::from_secs(config.ping_interval_secs.max(1)),
            threshold: config.keepalive_failure_threshold.max(1),
        }
    }

    /// Override the ping interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the watcher unless one is already running for this client.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.client.claim_watcher() {
            tracing::debug!("Keepalive watcher already running");
            return None;
        }
        Some(tokio::spawn(self.run()))
    }

    async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            threshold = self.threshold,
            "RPC keepalive watcher started"
        );
        let mut backoff = Backoff::new(RETRY_BASE, RETRY_CAP.max(self.interval));

        while !self.client.is_killed() {
            let healthy = self.check_peer(backoff.failures() > 0).await;
            metrics::record_rpc_connected(healthy);

            let delay = if healthy {
                backoff.reset();
                if self.client.set_emergency_mode(false) {
                    tracing::info!("RPC connection restored, leaving emergency mode");
                    self.events.fire(GatewayEvent::EmergencyMode { active: false });
                    self.queue.trigger();
                }
                self.interval
            } else {
                let delay = backoff.next_delay();
                tracing::warn!(
                    failures = backoff.failures(),
                    retry_in_ms = delay.as_millis() as u64,
                    "RPC ping failed"
                );
                if backoff.failures() >= self.threshold && !self.client.set_emergency_mode(true) {
                    tracing::error!(
                        failures = backoff.failures(),
                        "RPC peer unreachable, entering emergency mode"
                    );
                    self.events.fire(GatewayEvent::EmergencyMode { active: true });
                }
                delay
            };

            tokio::time::sleep(delay).await;
        }

        self.client.release_watcher();
        tracing::info!("RPC keepalive watcher stopped");
    }

    /// Ping, and log in again when recovering from failures.
    async fn check_peer(&self, recovering: bool) -> bool {
        match self.client.ping().await {
            Ok(true) if recovering => match self.client.login().await {
                Ok(true) => true,
                Ok(false) => {
                    tracing::error!("RPC login rejected");
                    false
                }
                Err(e) => {
                    tracing::warn!(error = %e, "RPC login failed");
                    false
                }
            },
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::debug!(error = %e, "RPC ping error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::ReloadOutcome;

    fn watcher(client: Arc<RpcClient>, queue: ReloadQueue) -> KeepaliveWatcher {
        let config = SlaveConfig {
            keepalive_failure_threshold: 1,
            ..SlaveConfig::default()
        };
        KeepaliveWatcher::new(client, queue, EventBus::new(), &config)
            .with_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_killed_client_stops_watcher() {
        let client = Arc::new(RpcClient::new("http://127.0.0.1:9", "k", Duration::from_millis(50)));
        client.kill();
        let (queue, _rx) = ReloadQueue::channel();
        let handle = watcher(client.clone(), queue).spawn().unwrap();
        handle.await.unwrap();
        assert!(!client.in_emergency_mode());
    }

    #[tokio::test]
    async fn test_single_watcher_per_client() {
        let client = Arc::new(RpcClient::new("http://127.0.0.1:9", "k", Duration::from_millis(50)));
        let (queue, _rx) = ReloadQueue::channel();
        let first = watcher(client.clone(), queue.clone()).spawn();
        assert!(first.is_some());
        assert!(watcher(client.clone(), queue.clone()).spawn().is_none());

        // Unreachable peer with threshold 1 enters emergency mode.
        tokio::time::timeout(Duration::from_secs(5), async {
            while !client.in_emergency_mode() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        client.kill();
        first.unwrap().await.unwrap();
        assert_eq!(queue.trigger(), ReloadOutcome::Queued);
    }
}
