//! RPC-relayed configuration source (slave mode).

use std::sync::Arc;

use async_trait::async_trait;

use crate::apidef::{ApiDefinition, Policy};
use crate::rpc::RpcClient;
use crate::sources::{decode_api_envelopes, keyed_policies, ConfigSource, SourceError};

/// Policies relayed by the management node are always keyed by record id.
pub struct RpcSource {
    client: Arc<RpcClient>,
    org_id: String,
}

impl RpcSource {
    pub fn new(client: Arc<RpcClient>, org_id: &str) -> Self {
        Self {
            client,
            org_id: org_id.to_string(),
        }
    }

    async fn fetch_apis(&self) -> Result<Vec<ApiDefinition>, SourceError> {
        let raw = self.client.get_api_definitions(&self.org_id).await?;
        decode_api_envelopes(&raw)
    }

    async fn fetch_policies(&self) -> Result<Vec<(String, Policy)>, SourceError> {
        let raw = self.client.get_policies(&self.org_id).await?;
        let policies: Vec<Policy> =
            serde_json::from_str(&raw).map_err(|source| SourceError::Decode {
                what: "policy list",
                source,
            })?;
        Ok(keyed_policies(policies, false))
    }
}

#[async_trait]
impl ConfigSource for RpcSource {
    async fn load_api_definitions(&self) -> Option<Vec<ApiDefinition>> {
        match self.fetch_apis().await {
            Ok(apis) => Some(apis),
            Err(e) => {
                tracing::error!(
                    org_id = %self.org_id,
                    error = %e,
                    "Failed to fetch API definitions over RPC"
                );
                None
            }
        }
    }

    async fn load_policies(&self) -> Option<Vec<(String, Policy)>> {
        match self.fetch_policies().await {
            Ok(policies) => Some(policies),
            Err(e) => {
                tracing::error!(
                    org_id = %self.org_id,
                    error = %e,
                    "Failed to fetch policies over RPC"
                );
                None
            }
        }
    }
}
