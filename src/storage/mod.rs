//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! session lookup / OAuth data / org keys / analytics
//!     → StorageFactory::handler(prefix)
//!     → local.rs (in-process clustered store)      standalone, dashboard
//!       rpc.rs   (relay to the management node)    RPC slave
//! ```
//!
//! # Design Decisions
//! - Every handler is scoped to a key prefix so unrelated data never collides
//! - Handlers are `Arc<dyn StorageHandler>` so the engine is chosen once per
//!   deployment mode and per-API session providers can override it

pub mod local;
pub mod rpc;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::apidef::StorageEngine;
use crate::deployment::DeploymentMode;
use crate::rpc::RpcClient;

pub use local::LocalStore;
pub use rpc::RpcStore;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC call {method} timed out after {secs} seconds")]
    Timeout { method: String, secs: u64 },

    #[error("failed to decode stored value: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}

/// Key/value capability shared by every backend.
///
/// Keys passed in and returned are relative to the handler's prefix.
#[async_trait]
pub trait StorageHandler: Send + Sync {
    async fn get_key(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_key(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), StorageError>;

    /// Returns true when a value was removed.
    async fn delete_key(&self, key: &str) -> Result<bool, StorageError>;

    /// Keys starting with `filter` (empty filter lists everything).
    async fn get_keys(&self, filter: &str) -> Result<Vec<String>, StorageError>;

    /// Delete every key starting with `filter`, returning how many went.
    async fn delete_keys(&self, filter: &str) -> Result<usize, StorageError>;

    async fn append_to_list(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Picks the storage engine for a prefix according to the deployment mode.
#[derive(Clone)]
pub struct StorageFactory {
    default_engine: StorageEngine,
    local: Option<LocalStore>,
    rpc: Option<Arc<RpcClient>>,
}

impl StorageFactory {
    pub fn new(
        mode: DeploymentMode,
        local: Option<LocalStore>,
        rpc: Option<Arc<RpcClient>>,
    ) -> Self {
        let default_engine = match mode {
            DeploymentMode::RpcSlave => StorageEngine::Rpc,
            DeploymentMode::Standalone | DeploymentMode::DashboardManaged => StorageEngine::Local,
        };
        Self {
            default_engine,
            local,
            rpc,
        }
    }

    /// Factory over a local store only.
    pub fn local_only(store: LocalStore) -> Self {
        Self::new(DeploymentMode::Standalone, Some(store), None)
    }

    /// Handler using the deployment mode's engine.
    pub fn handler(&self, prefix: &str) -> Result<Arc<dyn StorageHandler>, StorageError> {
        self.handler_for(self.default_engine, prefix)
    }

    /// Handler for a specific engine, falling back to whichever engine exists.
    pub fn handler_for(
        &self,
        engine: StorageEngine,
        prefix: &str,
    ) -> Result<Arc<dyn StorageHandler>, StorageError> {
        match (engine, &self.local, &self.rpc) {
            (StorageEngine::Local, Some(local), _) => Ok(Arc::new(local.with_prefix(prefix))),
            (StorageEngine::Rpc, _, Some(client)) => {
                Ok(Arc::new(RpcStore::new(client.clone(), prefix)))
            }
            (_, Some(local), None) => {
                tracing::warn!(?engine, prefix, "Requested engine unavailable, using local store");
                Ok(Arc::new(local.with_prefix(prefix)))
            }
            (_, None, Some(client)) => {
                tracing::warn!(?engine, prefix, "Requested engine unavailable, using RPC store");
                Ok(Arc::new(RpcStore::new(client.clone(), prefix)))
            }
            (_, None, None) => Err(StorageError::Unavailable(
                "no storage engine configured".to_string(),
            )),
        }
    }

    /// View of the local store under `prefix`, when one exists.
    pub fn local_store(&self, prefix: &str) -> Option<LocalStore> {
        self.local.as_ref().map(|local| local.with_prefix(prefix))
    }

    pub fn rpc_client(&self) -> Option<&Arc<RpcClient>> {
        self.rpc.as_ref()
    }
}
