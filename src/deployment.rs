//! Deployment mode resolution.

use std::fmt;

use crate::config::GatewayConfig;

/// Where configuration comes from and which store backs runtime data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// File-sourced configuration, local store.
    Standalone,
    /// Control-plane sourced configuration, local store, heartbeat registration.
    DashboardManaged,
    /// Configuration and storage relayed through the management node.
    RpcSlave,
}

impl DeploymentMode {
    /// Resolve the mode once from static configuration.
    ///
    /// A forced RPC auth provider wins over everything else.
    pub fn resolve(config: &GatewayConfig) -> Self {
        if config.auth_override.forces_rpc() || config.slave_options.use_rpc {
            DeploymentMode::RpcSlave
        } else if config.use_db_app_configs {
            DeploymentMode::DashboardManaged
        } else {
            DeploymentMode::Standalone
        }
    }

    pub fn is_rpc(self) -> bool {
        self == DeploymentMode::RpcSlave
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentMode::Standalone => "standalone",
            DeploymentMode::DashboardManaged => "dashboard",
            DeploymentMode::RpcSlave => "rpc",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apidef::StorageEngine;

    #[test]
    fn test_default_is_standalone() {
        assert_eq!(
            DeploymentMode::resolve(&GatewayConfig::default()),
            DeploymentMode::Standalone
        );
    }

    #[test]
    fn test_dashboard_mode() {
        let mut config = GatewayConfig::default();
        config.use_db_app_configs = true;
        assert_eq!(DeploymentMode::resolve(&config), DeploymentMode::DashboardManaged);
    }

    #[test]
    fn test_forced_rpc_provider_wins() {
        let mut config = GatewayConfig::default();
        config.use_db_app_configs = true;
        config.auth_override.force_auth_provider = true;
        config.auth_override.auth_provider.storage_engine = StorageEngine::Rpc;
        assert_eq!(DeploymentMode::resolve(&config), DeploymentMode::RpcSlave);
        assert!(DeploymentMode::resolve(&config).is_rpc());
    }

    #[test]
    fn test_use_rpc() {
        let mut config = GatewayConfig::default();
        config.slave_options.use_rpc = true;
        assert_eq!(DeploymentMode::resolve(&config).to_string(), "rpc");
    }
}
