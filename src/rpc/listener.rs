//! Polls the management node for reload signals.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::reload::ReloadQueue;
use crate::rpc::RpcClient;

pub struct RpcReloadListener {
    client: Arc<RpcClient>,
    queue: ReloadQueue,
    org_id: String,
    poll_interval: Duration,
}

impl RpcReloadListener {
    pub fn new(
        client: Arc<RpcClient>,
        queue: ReloadQueue,
        org_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            queue,
            org_id: org_id.into(),
            poll_interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(org_id = %self.org_id, "RPC reload listener started");
        while !self.client.is_killed() {
            if !self.client.in_emergency_mode() {
                match self.client.check_reload(&self.org_id).await {
                    Ok(true) => {
                        let outcome = self.queue.trigger();
                        tracing::info!(?outcome, "Reload signalled by management node");
                    }
                    Ok(false) => {}
                    Err(e) => tracing::debug!(error = %e, "CheckReload failed"),
                }
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        tracing::info!("RPC reload listener stopped");
    }
}
