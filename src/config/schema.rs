//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::apidef::{AuthProviderMeta, SessionProviderMeta, StorageEngine};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Shared secret that gates the control API (`x-tyk-authorization`).
    pub secret: String,

    /// Secret presented to the dashboard service.
    pub node_secret: String,

    /// Directory holding API definition files (standalone mode).
    pub app_path: String,

    /// Root directory for discovered custom middleware scripts.
    pub middleware_path: String,

    /// Host name used when registering with the dashboard.
    pub hostname: String,

    /// Pull API definitions from the dashboard service.
    pub use_db_app_configs: bool,

    pub db_app_conf_options: DashboardConfig,

    pub policies: PolicyConfig,

    pub slave_options: SlaveConfig,

    pub auth_override: AuthOverrideConfig,

    pub storage: StorageConfig,

    /// Record one analytics entry per proxied request in the local store.
    pub enable_analytics: bool,

    pub reload: ReloadConfig,

    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,

    /// Separator for multiple OAuth redirect URIs ("" = single URI).
    pub oauth_redirect_uri_separator: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Dashboard (control-plane) connection options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the dashboard service.
    pub connection_string: String,

    /// Seconds between heartbeat pings.
    pub heartbeat_interval_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            heartbeat_interval_secs: 2,
        }
    }
}

/// Where policies come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicySource {
    #[default]
    File,
    Service,
    Rpc,
}

/// Policy loading configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    pub policy_source: PolicySource,

    /// Path of the policy file when `policy_source = "file"`.
    pub policy_record_name: String,

    /// Base URL of the policy service when `policy_source = "service"`.
    pub policy_connection_string: String,

    /// Trust the `id` field of dashboard policies instead of the record id.
    pub allow_explicit_policy_id: bool,
}

/// RPC slave (hybrid) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SlaveConfig {
    pub use_rpc: bool,

    /// URL of the management node's RPC endpoint.
    pub connection_string: String,

    /// Organisation ID this node serves.
    pub rpc_key: String,

    /// Credential presented to the management node.
    pub api_key: String,

    /// Timeout for a single RPC call in seconds.
    pub call_timeout_secs: u64,

    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,

    /// Consecutive keepalive failures before entering emergency mode.
    pub keepalive_failure_threshold: u32,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            use_rpc: false,
            connection_string: String::new(),
            rpc_key: String::new(),
            api_key: String::new(),
            call_timeout_secs: 30,
            ping_interval_secs: 10,
            keepalive_failure_threshold: 3,
        }
    }
}

/// Provider overrides applied to every loaded API definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthOverrideConfig {
    pub force_auth_provider: bool,
    pub auth_provider: AuthProviderMeta,
    pub force_session_provider: bool,
    pub session_provider: SessionProviderMeta,
}

impl AuthOverrideConfig {
    /// True when the override relays auth storage through an RPC peer.
    pub fn forces_rpc(&self) -> bool {
        self.force_auth_provider && self.auth_provider.storage_engine == StorageEngine::Rpc
    }
}

/// Kind of local store backing runtime data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    None,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
}

/// Reload behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Minimum idle time after a reload before the next one may start.
    pub interval_secs: u64,

    /// Watch `app_path` and the policy file for changes (standalone only).
    pub watch_files: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            watch_files: false,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Dashboard and RPC configuration fetch timeout in seconds.
    pub config_fetch_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 120,
            config_fetch_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
