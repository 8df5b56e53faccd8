//! Store that relays every operation to the management node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::rpc::RpcClient;
use crate::storage::{StorageError, StorageHandler};

/// Prefix-scoped view over the RPC relay.
#[derive(Clone)]
pub struct RpcStore {
    client: Arc<RpcClient>,
    prefix: String,
}

impl RpcStore {
    pub fn new(client: Arc<RpcClient>, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn strip_prefix(&self, key: String) -> String {
        match key.strip_prefix(&self.prefix) {
            Some(rest) => rest.to_string(),
            None => key,
        }
    }
}

#[async_trait]
impl StorageHandler for RpcStore {
    async fn get_key(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.client.call("GetKey", json!([self.full_key(key)])).await
    }

    async fn set_key(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let ttl_secs = ttl.map_or(0, |ttl| ttl.as_secs().max(1));
        let _: bool = self
            .client
            .call("SetKey", json!([self.full_key(key), value, ttl_secs]))
            .await?;
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<bool, StorageError> {
        self.client.call("DeleteKey", json!([self.full_key(key)])).await
    }

    async fn get_keys(&self, filter: &str) -> Result<Vec<String>, StorageError> {
        let keys: Vec<String> = self
            .client
            .call("GetKeys", json!([self.full_key(filter)]))
            .await?;
        let mut keys: Vec<String> = keys.into_iter().map(|k| self.strip_prefix(k)).collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_keys(&self, filter: &str) -> Result<usize, StorageError> {
        self.client
            .call("DeleteKeys", json!([self.full_key(filter)]))
            .await
    }

    async fn append_to_list(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("append_to_list over RPC"))
    }
}
