//! Configuration sources.
//!
//! # Data Flow
//! ```text
//! file.rs      app_path/*.json + policy JSON object
//! dashboard.rs GET /system/apis, /system/policies (nonce rotating)
//! rpc.rs       GetApiDefinitions / GetPolicies via the RPC relay
//!     → Option<Vec<ApiDefinition>>, Option<Vec<(id, Policy)>>
//!     → SpecLoader / dedup_policies
//! ```
//!
//! # Design Decisions
//! - `None` means unavailable; callers keep their current configuration
//! - Policies come back as an ordered list with duplicates intact so the
//!   first-wins dedup is explicit in one place

pub mod dashboard;
pub mod file;
pub mod rpc;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::apidef::{ApiDefinition, ApiDefinitionEnvelope, Policy};
use crate::config::{GatewayConfig, PolicySource};
use crate::dashboard::DashboardClient;
use crate::deployment::DeploymentMode;
use crate::rpc::RpcClient;

pub use dashboard::DashboardSource;
pub use file::FileSource;
pub use rpc::RpcSource;

/// Errors raised while fetching configuration. Never surfaced past the
/// [`ConfigSource`] boundary; they are logged and turned into `None`.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Dashboard(#[from] crate::dashboard::DashboardError),

    #[error(transparent)]
    Rpc(#[from] crate::storage::StorageError),
}

/// Somewhere API definitions and policies can be loaded from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load_api_definitions(&self) -> Option<Vec<ApiDefinition>>;

    /// Policies in source order, paired with the id they are stored under.
    async fn load_policies(&self) -> Option<Vec<(String, Policy)>>;
}

/// Decode a JSON array of `{"api_definition": {...}}` items.
pub(crate) fn decode_api_envelopes(raw: &str) -> Result<Vec<ApiDefinition>, SourceError> {
    let envelopes: Vec<ApiDefinitionEnvelope> =
        serde_json::from_str(raw).map_err(|source| SourceError::Decode {
            what: "API definition list",
            source,
        })?;
    Ok(envelopes.into_iter().map(|e| e.api_definition).collect())
}

/// Pair control-plane policy records with their storage id. The stored
/// policy's `id` is rewritten to that id.
pub(crate) fn keyed_policies(
    policies: Vec<Policy>,
    allow_explicit_id: bool,
) -> Vec<(String, Policy)> {
    policies
        .into_iter()
        .map(|mut policy| {
            let id = policy.resolved_id(allow_explicit_id).to_string();
            policy.id = id.clone();
            (id, policy)
        })
        .collect()
}

/// The API source and policy source used by reloads.
#[derive(Clone)]
pub struct Sources {
    pub apis: Arc<dyn ConfigSource>,
    pub policies: Arc<dyn ConfigSource>,
}

impl Sources {
    /// Bind sources for a deployment mode.
    ///
    /// `dashboard` must be present in dashboard mode and `rpc` in RPC mode;
    /// validation guarantees the connection strings behind them.
    pub fn for_mode(
        mode: DeploymentMode,
        config: &GatewayConfig,
        dashboard: Option<Arc<DashboardClient>>,
        rpc: Option<Arc<RpcClient>>,
    ) -> Sources {
        let file: Arc<dyn ConfigSource> = Arc::new(FileSource::from_config(config));
        let allow_explicit = config.policies.allow_explicit_policy_id;

        let rpc_source = rpc.map(|client| {
            Arc::new(RpcSource::new(client, &config.slave_options.rpc_key))
                as Arc<dyn ConfigSource>
        });

        let apis = match (mode, &dashboard, &rpc_source) {
            (DeploymentMode::RpcSlave, _, Some(source)) => source.clone(),
            (DeploymentMode::DashboardManaged, Some(client), _) => Arc::new(DashboardSource::new(
                client.clone(),
                client.base_url(),
                allow_explicit,
            )) as Arc<dyn ConfigSource>,
            _ => file.clone(),
        };

        let policies = match (mode, config.policies.policy_source, &rpc_source) {
            (DeploymentMode::RpcSlave, _, Some(source)) => source.clone(),
            (_, PolicySource::Rpc, Some(source)) => source.clone(),
            (_, PolicySource::Service, _) => {
                let client = dashboard.unwrap_or_else(|| {
                    Arc::new(DashboardClient::new(
                        &config.policies.policy_connection_string,
                        &config.node_secret,
                        &config.hostname,
                        std::time::Duration::from_secs(config.timeouts.config_fetch_secs),
                    ))
                });
                Arc::new(DashboardSource::new(
                    client,
                    &config.policies.policy_connection_string,
                    allow_explicit,
                )) as Arc<dyn ConfigSource>
            }
            _ => file,
        };

        tracing::info!(
            %mode,
            policy_source = ?config.policies.policy_source,
            "Configuration sources bound"
        );
        Sources { apis, policies }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_api_envelopes() {
        let raw = r#"[{"api_definition":{"api_id":"a","proxy":{"listen_path":"/a/"}}},
                      {"api_definition":{"api_id":"b"}}]"#;
        let apis = decode_api_envelopes(raw).unwrap();
        assert_eq!(apis.len(), 2);
        assert_eq!(apis[0].proxy.listen_path, "/a/");
        assert!(decode_api_envelopes("{").is_err());
    }

    #[test]
    fn test_keyed_policies_use_record_id() {
        let policies = vec![
            Policy {
                id: "gold".into(),
                mid: "m1".into(),
                ..Policy::default()
            },
            Policy {
                mid: "m2".into(),
                ..Policy::default()
            },
        ];
        let keyed = keyed_policies(policies.clone(), false);
        assert_eq!(keyed[0].0, "m1");
        assert_eq!(keyed[0].1.id, "m1");
        let keyed = keyed_policies(policies, true);
        assert_eq!(keyed[0].0, "gold");
        assert_eq!(keyed[1].0, "m2");
        assert_eq!(keyed[1].1.id, "m2");
    }
}
