//! Control API served under `/tyk`.
//!
//! # Routes
//! ```text
//! /reload/, /reload/group                      all modes
//! /keys/create, /keys/{key}, /keys/policy/{key} all modes
//! /oauth/clients/..., /oauth/refresh/{token}   all modes
//! /apis, /apis/{id}                            not in RPC mode (writes: file mode only)
//! /org/keys/{org}                              not in RPC mode
//! /cache/{api_id}, /health/                    not in RPC mode
//! ```
//! Every route requires `x-tyk-authorization: <secret>`.

pub mod auth;
pub mod handlers;
pub mod keys;
pub mod oauth;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::config::GatewayConfig;
use crate::deployment::DeploymentMode;
use crate::health::HealthReporter;
use crate::http::response::ApiStatus;
use crate::policy::PolicyStore;
use crate::registry::SharedSnapshot;
use crate::reload::ReloadQueue;
use crate::storage::{StorageError, StorageFactory};

use self::auth::admin_auth_middleware;

/// State shared by every control API handler.
#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<GatewayConfig>,
    pub mode: DeploymentMode,
    pub queue: ReloadQueue,
    pub snapshot: SharedSnapshot,
    pub storage: StorageFactory,
    pub policies: Arc<PolicyStore>,
    pub health: Arc<HealthReporter>,
}

pub(crate) fn storage_failure(error: StorageError) -> Response {
    tracing::error!(error = %error, "Control API storage operation failed");
    ApiStatus::error("Storage backend unavailable").with_status(StatusCode::SERVICE_UNAVAILABLE)
}

pub(crate) fn not_found(message: &str) -> Response {
    ApiStatus::error(message).with_status(StatusCode::NOT_FOUND)
}

pub fn admin_router(state: AdminState) -> Router {
    let mut router = Router::new()
        .route("/reload/", get(handlers::reload))
        .route("/reload", get(handlers::reload))
        .route("/reload/group", get(handlers::reload_group))
        .route("/keys/create", post(keys::create_key))
        .route("/keys/", get(keys::list_keys))
        .route(
            "/keys/{key}",
            get(keys::get_key)
                .post(keys::add_key)
                .put(keys::update_key)
                .delete(keys::delete_key),
        )
        .route("/keys/policy/{key}", put(keys::set_key_policies))
        .route("/oauth/clients/create", post(oauth::create_client))
        .route("/oauth/clients/{api_id}", get(oauth::list_clients))
        .route(
            "/oauth/clients/{api_id}/{client_id}",
            get(oauth::get_client).delete(oauth::delete_client),
        )
        .route("/oauth/refresh/{token}", delete(oauth::invalidate_refresh_token));

    if !state.mode.is_rpc() {
        router = router
            .route("/apis", get(handlers::list_apis).post(handlers::create_api))
            .route("/apis/", get(handlers::list_apis).post(handlers::create_api))
            .route(
                "/apis/{api_id}",
                get(handlers::get_api)
                    .put(handlers::update_api)
                    .delete(handlers::delete_api),
            )
            .route(
                "/org/keys/{org_id}",
                get(keys::get_org_key)
                    .post(keys::add_org_key)
                    .put(keys::add_org_key)
                    .delete(keys::delete_org_key),
            )
            .route("/cache/{api_id}", delete(handlers::invalidate_cache))
            .route("/health/", get(handlers::api_health))
            .route("/health", get(handlers::api_health));
    } else {
        tracing::info!("RPC mode: control API limited to reload, keys and OAuth clients");
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
