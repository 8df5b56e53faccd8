//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject mutually exclusive deployment modes
//! - Reject storage combinations the gateway cannot serve
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, PolicySource, StorageKind};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidBindAddress(String),
    MissingSecret,
    ConflictingModes,
    MissingDashboardConnection,
    MissingPolicyConnection,
    MissingRpcConnection,
    RpcPoliciesWithoutRpc,
    AnalyticsRequiresLocalStore,
    LocalStoreRequired,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "invalid listener bind address '{}'", addr)
            }
            ValidationError::MissingSecret => write!(f, "control API secret is empty"),
            ValidationError::ConflictingModes => {
                write!(f, "use_db_app_configs and slave_options.use_rpc are mutually exclusive")
            }
            ValidationError::MissingDashboardConnection => {
                write!(f, "dashboard mode requires db_app_conf_options.connection_string")
            }
            ValidationError::MissingPolicyConnection => {
                write!(f, "policy_source = \"service\" requires policy_connection_string")
            }
            ValidationError::MissingRpcConnection => {
                write!(f, "RPC mode requires slave_options.connection_string")
            }
            ValidationError::RpcPoliciesWithoutRpc => {
                write!(f, "policy_source = \"rpc\" requires RPC mode")
            }
            ValidationError::AnalyticsRequiresLocalStore => {
                write!(f, "analytics requires the local storage backend")
            }
            ValidationError::LocalStoreRequired => {
                write!(f, "standalone and dashboard modes require the local storage backend")
            }
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let rpc_mode = config.slave_options.use_rpc || config.auth_override.forces_rpc();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.secret.is_empty() {
        errors.push(ValidationError::MissingSecret);
    }

    if config.use_db_app_configs && rpc_mode {
        errors.push(ValidationError::ConflictingModes);
    }

    if config.use_db_app_configs && config.db_app_conf_options.connection_string.is_empty() {
        errors.push(ValidationError::MissingDashboardConnection);
    }

    match config.policies.policy_source {
        PolicySource::Service if config.policies.policy_connection_string.is_empty() => {
            errors.push(ValidationError::MissingPolicyConnection);
        }
        PolicySource::Rpc if !rpc_mode => errors.push(ValidationError::RpcPoliciesWithoutRpc),
        _ => {}
    }

    if rpc_mode && config.slave_options.connection_string.is_empty() {
        errors.push(ValidationError::MissingRpcConnection);
    }

    if config.storage.kind != StorageKind::Local {
        if config.enable_analytics {
            errors.push(ValidationError::AnalyticsRequiresLocalStore);
        }
        if !rpc_mode {
            errors.push(ValidationError::LocalStoreRequired);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
