//! One reload cycle: fetch, build, publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::chain::ChainBuilder;
use crate::config::AuthOverrideConfig;
use crate::observability::{metrics, EventBus, GatewayEvent};
use crate::policy::{dedup_policies, PolicyStore};
use crate::registry::{RegistrySnapshot, SharedSnapshot, SpecLoader};
use crate::reload::Reload;
use crate::rpc::RpcClient;
use crate::sources::Sources;

/// Result of one reload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadResult {
    Published { generation: u64, apis: usize },
    /// The RPC peer is unreachable; the last snapshot keeps serving.
    SkippedEmergency,
    /// No definitions were available; the last snapshot keeps serving.
    SkippedNoDefinitions,
}

pub struct Reloader {
    sources: Sources,
    loader: SpecLoader,
    policies: Arc<PolicyStore>,
    builder: ChainBuilder,
    snapshot: SharedSnapshot,
    rpc: Option<Arc<RpcClient>>,
    events: EventBus,
    generation: AtomicU64,
}

impl Reloader {
    pub fn new(
        sources: Sources,
        overrides: AuthOverrideConfig,
        policies: Arc<PolicyStore>,
        builder: ChainBuilder,
        snapshot: SharedSnapshot,
    ) -> Self {
        Self {
            loader: SpecLoader::new(sources.apis.clone(), overrides),
            sources,
            policies,
            builder,
            snapshot,
            rpc: None,
            events: EventBus::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Skip reloads while this client is in emergency mode.
    pub fn with_rpc(mut self, client: Arc<RpcClient>) -> Self {
        self.rpc = Some(client);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    async fn sync_policies(&self) {
        match self.sources.policies.load_policies().await {
            Some(entries) => {
                self.policies.replace(Some(dedup_policies(entries)));
            }
            None => tracing::warn!("Policies unavailable, keeping current set"),
        }
    }

    pub async fn reload_once(&self) -> ReloadResult {
        if self.rpc.as_ref().is_some_and(|c| c.in_emergency_mode()) {
            tracing::warn!("RPC emergency mode active, skipping reload");
            metrics::record_reload("skipped_emergency");
            return ReloadResult::SkippedEmergency;
        }

        self.sync_policies().await;

        let Some(specs) = self.loader.load().await else {
            metrics::record_reload("skipped_empty");
            return ReloadResult::SkippedNoDefinitions;
        };

        let policies = self.policies.snapshot();
        let mut pipelines = Vec::with_capacity(specs.len());
        for spec in &specs {
            match self.builder.build(spec, policies.clone()) {
                Ok(pipeline) => {
                    tracing::info!(
                        api_id = %spec.api_id,
                        listen_path = %spec.proxy.listen_path,
                        "Loading API"
                    );
                    pipelines.push(pipeline);
                }
                Err(e) => {
                    tracing::error!(
                        api_id = %spec.api_id,
                        error = %e,
                        "Failed to build API pipeline, skipping"
                    );
                }
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let apis = pipelines.len();
        self.snapshot
            .store(Arc::new(RegistrySnapshot::new(generation, pipelines, policies)));

        metrics::record_reload("published");
        metrics::record_apis_loaded(apis);
        self.events.fire(GatewayEvent::ReloadComplete { generation, apis });
        tracing::info!(generation, apis, "API configuration reloaded");
        ReloadResult::Published { generation, apis }
    }
}

#[async_trait]
impl Reload for Reloader {
    async fn reload(&self) {
        self.reload_once().await;
    }
}
