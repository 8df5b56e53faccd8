//! Startup orchestration.
//!
//! # Order
//! ```text
//! validate config → resolve mode → stores and clients → chain builder
//!     → reload coordinator → (start) register / login → background tasks
//!     → initial reload → serve until a shutdown signal
//! ```
//! Traffic is accepted only after the first reload has published.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::AdminState;
use crate::chain::{ChainBuilder, ChainSettings, OAuthServerFactory, ScriptRuntime, UpstreamProxy};
use crate::config::{validate_config, ConfigError, ConfigWatcher, GatewayConfig, StorageKind};
use crate::dashboard::{DashboardClient, Heartbeat, HeartbeatHandle};
use crate::deployment::DeploymentMode;
use crate::health::HealthReporter;
use crate::http::GatewayServer;
use crate::lifecycle::handoff::take_handoff;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{spawn_reload_on_hangup, wait_for_shutdown};
use crate::observability::analytics::{ANALYTICS_PREFIX, ANALYTICS_PURGE_INTERVAL};
use crate::observability::{AnalyticsPurger, AnalyticsRecorder, EventBus};
use crate::policy::PolicyStore;
use crate::registry::{empty_snapshot, SharedSnapshot};
use crate::reload::{ReloadLoop, ReloadQueue, ReloadReceiver, Reloader};
use crate::rpc::{KeepaliveWatcher, RpcClient, RpcReloadListener};
use crate::sources::Sources;
use crate::storage::{LocalStore, StorageFactory};

const REGISTRATION_ATTEMPTS: u32 = 10;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("control plane registration failed: {0}")]
    Registration(#[from] crate::dashboard::DashboardError),

    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),
}

/// Pluggable collaborators that live outside the gateway.
#[derive(Default)]
pub struct Collaborators {
    pub scripts: Option<Arc<dyn ScriptRuntime>>,
    pub oauth: Option<Arc<dyn OAuthServerFactory>>,
    pub upstream: Option<Arc<dyn UpstreamProxy>>,
}

/// A fully wired gateway, ready to start.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    mode: DeploymentMode,
    admin: AdminState,
    reloader: Arc<Reloader>,
    receiver: ReloadReceiver,
    events: EventBus,
    dashboard: Option<Arc<DashboardClient>>,
    heartbeat: Option<Heartbeat>,
    rpc: Option<Arc<RpcClient>>,
    analytics: Option<AnalyticsPurger>,
    shutdown: Shutdown,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        Self::with_collaborators(config, Collaborators::default())
    }

    pub fn with_collaborators(
        config: GatewayConfig,
        collaborators: Collaborators,
    ) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let config = Arc::new(config);
        let mode = DeploymentMode::resolve(&config);
        tracing::info!(%mode, "Deployment mode resolved");

        let local = (config.storage.kind == StorageKind::Local).then(LocalStore::new);
        let rpc = mode
            .is_rpc()
            .then(|| Arc::new(RpcClient::from_config(&config.slave_options)));
        let fetch_timeout = Duration::from_secs(config.timeouts.config_fetch_secs);
        let dashboard = (mode == DeploymentMode::DashboardManaged).then(|| {
            Arc::new(DashboardClient::new(
                &config.db_app_conf_options.connection_string,
                &config.node_secret,
                &config.hostname,
                fetch_timeout,
            ))
        });

        let storage = StorageFactory::new(mode, local, rpc.clone());
        let events = EventBus::new();
        let health = Arc::new(HealthReporter::new());

        let mut builder = ChainBuilder::new(ChainSettings::from_config(&config), storage.clone())
            .with_events(events.clone())
            .with_health(health.clone());
        let mut analytics = None;
        if config.enable_analytics {
            if let Some(store) = storage.local_store(ANALYTICS_PREFIX) {
                builder = builder.with_analytics(AnalyticsRecorder::new(Arc::new(store.clone())));
                analytics = Some(AnalyticsPurger::new(store, ANALYTICS_PURGE_INTERVAL));
            }
        }
        if let Some(scripts) = collaborators.scripts {
            builder = builder.with_script_runtime(scripts);
        }
        if let Some(oauth) = collaborators.oauth {
            builder = builder.with_oauth_server(oauth);
        }
        if let Some(upstream) = collaborators.upstream {
            builder = builder.with_upstream(upstream);
        }

        let sources = Sources::for_mode(mode, &config, dashboard.clone(), rpc.clone());
        let policies = Arc::new(PolicyStore::new());
        let snapshot: SharedSnapshot = empty_snapshot();
        let (queue, receiver) = ReloadQueue::channel();

        let mut reloader = Reloader::new(
            sources,
            config.auth_override.clone(),
            policies.clone(),
            builder,
            snapshot.clone(),
        )
        .with_events(events.clone());
        if let Some(client) = &rpc {
            reloader = reloader.with_rpc(client.clone());
        }

        let heartbeat = dashboard.as_ref().map(|client| {
            Heartbeat::new(
                client.clone(),
                Duration::from_secs(config.db_app_conf_options.heartbeat_interval_secs.max(1)),
            )
        });

        let admin = AdminState {
            config: config.clone(),
            mode,
            queue,
            snapshot,
            storage,
            policies,
            health,
        };

        Ok(Self {
            config,
            mode,
            admin,
            reloader: Arc::new(reloader),
            receiver,
            events,
            dashboard,
            heartbeat,
            rpc,
            analytics,
            shutdown: Shutdown::new(),
        })
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn admin_state(&self) -> AdminState {
        self.admin.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Handle for suspending the control-plane heartbeat ahead of a handoff.
    pub fn heartbeat(&self) -> Option<HeartbeatHandle> {
        self.heartbeat.as_ref().map(Heartbeat::handle)
    }

    /// Trigger this to stop a running gateway.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Bring the node up and serve on `listener` until shutdown.
    pub async fn start(self, listener: TcpListener) -> Result<(), StartupError> {
        let Gateway {
            config,
            mode,
            admin,
            reloader,
            receiver,
            events,
            dashboard,
            heartbeat,
            rpc,
            analytics,
            shutdown,
        } = self;

        let heartbeat_handle = heartbeat.as_ref().map(Heartbeat::handle);
        if let (Some(client), Some(heartbeat)) = (&dashboard, heartbeat) {
            match take_handoff() {
                Some(identity) => client.resume(identity),
                None => {
                    client.register_with_retry(REGISTRATION_ATTEMPTS).await?;
                }
            }
            tokio::spawn(heartbeat.run(shutdown.subscribe()));
        }

        if let Some(client) = &rpc {
            match client.login().await {
                Ok(true) => tracing::info!("Logged in to management node"),
                Ok(false) => tracing::warn!("Management node rejected login"),
                Err(e) => tracing::warn!(error = %e, "Management node login failed"),
            }
            KeepaliveWatcher::new(
                client.clone(),
                admin.queue.clone(),
                events.clone(),
                &config.slave_options,
            )
            .spawn();
            let listener = RpcReloadListener::new(
                client.clone(),
                admin.queue.clone(),
                config.slave_options.rpc_key.clone(),
                Duration::from_secs(config.slave_options.ping_interval_secs.max(1)),
            );
            tokio::spawn(listener.run(shutdown.subscribe()));
        }

        if let Some(purger) = analytics {
            tokio::spawn(purger.run(shutdown.subscribe()));
        }

        let reload_loop = ReloadLoop::new(
            receiver,
            reloader,
            Duration::from_secs(config.reload.interval_secs),
        );
        tokio::spawn(reload_loop.run(shutdown.subscribe()));
        admin.queue.trigger_and_wait().await;
        tracing::info!(apis = admin.snapshot.load().len(), "Initial configuration loaded");

        let _watcher = if mode == DeploymentMode::Standalone && config.reload.watch_files {
            let mut paths = vec![PathBuf::from(&config.app_path)];
            if !config.policies.policy_record_name.is_empty() {
                paths.push(PathBuf::from(&config.policies.policy_record_name));
            }
            Some(ConfigWatcher::new(paths, admin.queue.clone()).run()?)
        } else {
            None
        };

        spawn_reload_on_hangup(admin.queue.clone(), shutdown.subscribe());

        let stop = shutdown.signalled();
        let server = GatewayServer::new(admin);
        let served = server
            .run(listener, async move {
                tokio::select! {
                    _ = wait_for_shutdown() => {},
                    _ = stop => {},
                }
            })
            .await;

        shutdown.trigger();
        if let Some(client) = &dashboard {
            let handed_over = heartbeat_handle
                .as_ref()
                .is_some_and(HeartbeatHandle::is_suspended);
            if !handed_over {
                if let Err(e) = client.deregister().await {
                    tracing::warn!(error = %e, "Deregistration failed");
                }
            }
        }
        if let Some(client) = &rpc {
            client.kill();
        }

        served?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
