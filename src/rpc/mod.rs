//! RPC relay to the management node (hybrid / slave deployments).
//!
//! # Data Flow
//! ```text
//! RpcStore / RPC config source
//!     → RpcClient::call (JSON-RPC 2.0 over HTTP POST, bounded by call timeout)
//!     → management node
//!
//! keepalive.rs: Ping loop → connection state → emergency mode
//! listener.rs:  CheckReload loop → reload queue
//! ```
//!
//! # Design Decisions
//! - One client per process, shared via Arc
//! - Connection state is atomics only, readable from any task
//! - Every call carries a deadline; a timed-out call never blocks a reload

pub mod keepalive;
pub mod listener;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::config::SlaveConfig;
use crate::storage::StorageError;

pub use keepalive::KeepaliveWatcher;
pub use listener::RpcReloadListener;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Client for the management node.
pub struct RpcClient {
    http: reqwest::Client,
    address: String,
    api_key: String,
    call_timeout: Duration,
    next_id: AtomicU64,
    connected: AtomicBool,
    emergency: AtomicBool,
    killed: AtomicBool,
    watcher_running: AtomicBool,
}

impl RpcClient {
    pub fn new(
        address: impl Into<String>,
        api_key: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            address: address.into(),
            api_key: api_key.into(),
            call_timeout,
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            emergency: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            watcher_running: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &SlaveConfig) -> Self {
        Self::new(
            config.connection_string.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.call_timeout_secs),
        )
    }

    /// Invoke `method` and decode its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, StorageError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let exchange = async {
            self.http
                .post(&self.address)
                .header("authorization", &self.api_key)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<RpcResponse>()
                .await
        };

        let envelope = match timeout(self.call_timeout, exchange).await {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => {
                self.connected.store(false, Ordering::Relaxed);
                return Err(StorageError::Rpc(format!("{}: {}", method, e)));
            }
            Err(_) => {
                self.connected.store(false, Ordering::Relaxed);
                return Err(StorageError::Timeout {
                    method: method.to_string(),
                    secs: self.call_timeout.as_secs(),
                });
            }
        };
        self.connected.store(true, Ordering::Relaxed);

        if let Some(error) = envelope.error {
            return Err(StorageError::Rpc(format!(
                "{} failed ({}): {}",
                method, error.code, error.message
            )));
        }
        Ok(serde_json::from_value(envelope.result)?)
    }

    /// Authenticate this node against the management node.
    pub async fn login(&self) -> Result<bool, StorageError> {
        self.call("Login", json!([self.api_key])).await
    }

    pub async fn ping(&self) -> Result<bool, StorageError> {
        self.call("Ping", json!([])).await
    }

    /// JSON-encoded policy list for an organisation.
    pub async fn get_policies(&self, org_id: &str) -> Result<String, StorageError> {
        self.call("GetPolicies", json!([org_id])).await
    }

    /// JSON-encoded API definition list for an organisation.
    pub async fn get_api_definitions(&self, org_id: &str) -> Result<String, StorageError> {
        self.call("GetApiDefinitions", json!([org_id])).await
    }

    /// Long-poll for a reload signal from the management node.
    pub async fn check_reload(&self, org_id: &str) -> Result<bool, StorageError> {
        self.call("CheckReload", json!([org_id])).await
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn in_emergency_mode(&self) -> bool {
        self.emergency.load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set_emergency_mode(&self, on: bool) -> bool {
        self.emergency.swap(on, Ordering::AcqRel)
    }

    /// Mark the connection terminated; background loops exit on their next pass.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    /// Claim the keepalive slot. Only one watcher runs per client.
    fn claim_watcher(&self) -> bool {
        !self.watcher_running.swap(true, Ordering::AcqRel)
    }

    fn release_watcher(&self) {
        self.watcher_running.store(false, Ordering::Release);
    }
}
