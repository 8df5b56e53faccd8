//! HTTP client for the control-plane service.
//!
//! Every call carries the shared secret, this node's id and the current
//! nonce. Every successful response rotates the nonce; a 403 means the nonce
//! (or registration) is stale and the node must register again.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::resilience::Backoff;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("control plane request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("control plane rejected the node credentials")]
    Forbidden,

    #[error("control plane returned HTTP {0}")]
    Status(u16),

    #[error("registration rejected: {0}")]
    Rejected(String),

    #[error("control plane request timed out after {0:?}")]
    Timeout(Duration),
}

/// Registration state shared by fetches and the heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIdentity {
    pub node_id: String,
    pub nonce: String,
}

#[derive(Deserialize)]
struct RegistrationResponse {
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Message", default)]
    message: RegistrationMessage,
    #[serde(rename = "Nonce", default)]
    nonce: String,
}

#[derive(Deserialize, Default)]
struct RegistrationMessage {
    #[serde(rename = "NodeID", default)]
    node_id: String,
}

#[derive(Deserialize)]
struct ListPayload<T> {
    #[serde(rename = "Message", default = "Vec::new")]
    message: Vec<T>,
    #[serde(rename = "Nonce", default)]
    nonce: String,
}

#[derive(Deserialize)]
struct PingPayload {
    #[serde(rename = "Nonce", default)]
    nonce: String,
}

pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
    hostname: String,
    timeout: Duration,
    identity: RwLock<NodeIdentity>,
}

impl DashboardClient {
    pub fn new(base_url: &str, secret: &str, hostname: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
            hostname: hostname.to_string(),
            timeout,
            identity: RwLock::new(NodeIdentity::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity
            .read()
            .map(|identity| identity.clone())
            .unwrap_or_default()
    }

    /// Adopt an identity handed over by a previous process.
    pub fn resume(&self, identity: NodeIdentity) {
        tracing::info!(node_id = %identity.node_id, "Resuming control plane registration");
        self.set_identity(identity);
    }

    pub fn is_registered(&self) -> bool {
        !self.identity().node_id.is_empty()
    }

    fn set_identity(&self, identity: NodeIdentity) {
        if let Ok(mut current) = self.identity.write() {
            *current = identity;
        }
    }

    fn set_nonce(&self, nonce: String) {
        if let Ok(mut current) = self.identity.write() {
            current.nonce = nonce;
        }
    }

    fn clear_nonce(&self) {
        self.set_nonce(String::new());
    }

    fn authorised(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let identity = self.identity();
        request
            .header("authorization", &self.secret)
            .header("x-tyk-nodeid", identity.node_id)
            .header("x-tyk-nonce", identity.nonce)
            .timeout(self.timeout)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DashboardError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DashboardError::Timeout(self.timeout)
            } else {
                DashboardError::Http(e)
            }
        })?;
        match response.status() {
            StatusCode::FORBIDDEN => {
                self.clear_nonce();
                Err(DashboardError::Forbidden)
            }
            status if !status.is_success() => Err(DashboardError::Status(status.as_u16())),
            _ => Ok(response),
        }
    }

    /// Register this node and store the issued id and nonce.
    pub async fn register(&self) -> Result<NodeIdentity, DashboardError> {
        let url = format!("{}/register/node", self.base_url);
        let request = self
            .http
            .post(&url)
            .header("authorization", &self.secret)
            .header("x-tyk-hostname", &self.hostname)
            .timeout(self.timeout);

        let body: RegistrationResponse = self.send(request).await?.json().await?;
        if body.status != "ok" || body.message.node_id.is_empty() {
            return Err(DashboardError::Rejected(body.status));
        }

        let identity = NodeIdentity {
            node_id: body.message.node_id,
            nonce: body.nonce,
        };
        self.set_identity(identity.clone());
        tracing::info!(node_id = %identity.node_id, "Registered with control plane");
        Ok(identity)
    }

    /// Register, retrying with backoff up to `max_attempts` times.
    pub async fn register_with_retry(
        &self,
        max_attempts: u32,
    ) -> Result<NodeIdentity, DashboardError> {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(10));
        loop {
            match self.register().await {
                Ok(identity) => return Ok(identity),
                Err(e) if backoff.failures() + 1 >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Registration failed"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// GET a `{"Message": [...], "Nonce": ...}` list from `url`, rotating the nonce.
    pub async fn fetch_list<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Vec<T>, DashboardError> {
        let response = self.send(self.authorised(self.http.get(url))).await?;
        let payload: ListPayload<T> = response.json().await?;
        self.set_nonce(payload.nonce);
        Ok(payload.message)
    }

    pub async fn heartbeat(&self) -> Result<(), DashboardError> {
        let url = format!("{}/register/ping", self.base_url);
        let response = self.send(self.authorised(self.http.get(&url))).await?;
        let payload: PingPayload = response.json().await?;
        self.set_nonce(payload.nonce);
        Ok(())
    }

    pub async fn deregister(&self) -> Result<(), DashboardError> {
        let url = format!("{}/system/node", self.base_url);
        self.send(self.authorised(self.http.delete(&url))).await?;
        tracing::info!("Deregistered from control plane");
        self.set_identity(NodeIdentity::default());
        Ok(())
    }
}
