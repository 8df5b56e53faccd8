//! Control-plane configuration source (dashboard mode).

use std::sync::Arc;

use async_trait::async_trait;

use crate::apidef::{ApiDefinition, ApiDefinitionEnvelope, Policy};
use crate::dashboard::{DashboardClient, DashboardError};
use crate::sources::{keyed_policies, ConfigSource};

pub struct DashboardSource {
    client: Arc<DashboardClient>,
    base_url: String,
    allow_explicit_policy_id: bool,
}

impl DashboardSource {
    pub fn new(
        client: Arc<DashboardClient>,
        base_url: &str,
        allow_explicit_policy_id: bool,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            allow_explicit_policy_id,
        }
    }

    /// Log a failed fetch; on 403 register again before giving up this cycle.
    async fn handle_failure(&self, what: &str, error: DashboardError) {
        match error {
            DashboardError::Forbidden => {
                tracing::warn!(what, "Control plane rejected nonce, registering again");
                if let Err(e) = self.client.register().await {
                    tracing::error!(error = %e, "Re-registration failed");
                }
            }
            e => tracing::error!(what, error = %e, "Control plane fetch failed"),
        }
    }
}

#[async_trait]
impl ConfigSource for DashboardSource {
    async fn load_api_definitions(&self) -> Option<Vec<ApiDefinition>> {
        let url = format!("{}/system/apis", self.base_url);
        match self.client.fetch_list::<ApiDefinitionEnvelope>(&url).await {
            Ok(envelopes) => {
                tracing::info!(
                    count = envelopes.len(),
                    "Fetched API definitions from control plane"
                );
                Some(envelopes.into_iter().map(|e| e.api_definition).collect())
            }
            Err(e) => {
                self.handle_failure("apis", e).await;
                None
            }
        }
    }

    async fn load_policies(&self) -> Option<Vec<(String, Policy)>> {
        let url = format!("{}/system/policies", self.base_url);
        match self.client.fetch_list::<Policy>(&url).await {
            Ok(policies) => {
                tracing::info!(count = policies.len(), "Fetched policies from control plane");
                Some(keyed_policies(policies, self.allow_explicit_policy_id))
            }
            Err(e) => {
                self.handle_failure("policies", e).await;
                None
            }
        }
    }
}
