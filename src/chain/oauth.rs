//! OAuth2 endpoint wiring.
//!
//! The authorization-server protocol is provided by an [`OAuthServerFactory`];
//! the gateway mounts its three endpoints under each API's listen path and
//! gives every API its own storage prefix.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::admin::auth::is_owner;
use crate::apidef::ApiDefinition;
use crate::http::response::error_response;
use crate::storage::{StorageError, StorageHandler};

pub const OAUTH_PREFIX: &str = "oauth-data.";
const CLIENT_PREFIX: &str = "oauth-clientid.";
const REFRESH_PREFIX: &str = "oauth-refresh.";

/// Storage prefix isolating one API's OAuth data.
pub fn oauth_prefix(api_id: &str) -> String {
    format!("{OAUTH_PREFIX}{api_id}.")
}

/// Settings handed to the authorization server of one API.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthServerConfig {
    pub api_id: String,
    pub allowed_access_types: Vec<String>,
    pub allowed_authorize_types: Vec<String>,
    pub auth_login_redirect: String,
    pub error_status: StatusCode,
    pub redirect_uri_separator: String,
}

impl OAuthServerConfig {
    pub fn for_api(api: &ApiDefinition, redirect_uri_separator: &str) -> Self {
        Self {
            api_id: api.api_id.clone(),
            allowed_access_types: api.oauth_meta.allowed_access_types.clone(),
            allowed_authorize_types: api.oauth_meta.allowed_authorize_types.clone(),
            auth_login_redirect: api.oauth_meta.auth_login_redirect.clone(),
            error_status: StatusCode::FORBIDDEN,
            redirect_uri_separator: redirect_uri_separator.to_string(),
        }
    }
}

#[async_trait]
pub trait AuthorizationServer: Send + Sync {
    /// Owner-only endpoint issuing an authorization code for a client.
    async fn authorize_client(&self, request: Request<Body>) -> Response;

    async fn authorize(&self, request: Request<Body>) -> Response;

    async fn token(&self, request: Request<Body>) -> Response;
}

pub trait OAuthServerFactory: Send + Sync {
    fn build(
        &self,
        config: OAuthServerConfig,
        storage: OAuthStorage,
    ) -> Arc<dyn AuthorizationServer>;
}

/// Factory used when no authorization server is plugged in; every endpoint
/// answers 501.
pub struct UnconfiguredOAuth;

struct UnconfiguredServer {
    api_id: String,
}

impl UnconfiguredServer {
    fn reply(&self) -> Response {
        tracing::warn!(
            api_id = %self.api_id,
            "OAuth request but no authorization server is configured"
        );
        error_response(StatusCode::NOT_IMPLEMENTED, "OAuth authorization server not configured")
    }
}

#[async_trait]
impl AuthorizationServer for UnconfiguredServer {
    async fn authorize_client(&self, _request: Request<Body>) -> Response {
        self.reply()
    }

    async fn authorize(&self, _request: Request<Body>) -> Response {
        self.reply()
    }

    async fn token(&self, _request: Request<Body>) -> Response {
        self.reply()
    }
}

impl OAuthServerFactory for UnconfiguredOAuth {
    fn build(
        &self,
        config: OAuthServerConfig,
        _storage: OAuthStorage,
    ) -> Arc<dyn AuthorizationServer> {
        Arc::new(UnconfiguredServer { api_id: config.api_id })
    }
}

/// Registered OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OAuthClient {
    pub client_id: String,
    pub secret: String,
    pub redirect_uri: String,
    pub api_id: String,
    pub policy_id: String,
    pub meta_data: serde_json::Value,
}

/// OAuth records of one API.
#[derive(Clone)]
pub struct OAuthStorage {
    store: Arc<dyn StorageHandler>,
}

impl OAuthStorage {
    pub fn new(store: Arc<dyn StorageHandler>) -> Self {
        Self { store }
    }

    pub fn handler(&self) -> &Arc<dyn StorageHandler> {
        &self.store
    }

    pub async fn set_client(&self, client: &OAuthClient) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(client)?;
        self.store
            .set_key(&format!("{CLIENT_PREFIX}{}", client.client_id), &encoded, None)
            .await
    }

    pub async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>, StorageError> {
        match self.store.get_key(&format!("{CLIENT_PREFIX}{client_id}")).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_client(&self, client_id: &str) -> Result<bool, StorageError> {
        self.store.delete_key(&format!("{CLIENT_PREFIX}{client_id}")).await
    }

    pub async fn list_clients(&self) -> Result<Vec<OAuthClient>, StorageError> {
        let mut clients = Vec::new();
        for key in self.store.get_keys(CLIENT_PREFIX).await? {
            if let Some(raw) = self.store.get_key(&key).await? {
                match serde_json::from_str(&raw) {
                    Ok(client) => clients.push(client),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Skipping undecodable OAuth client")
                    }
                }
            }
        }
        Ok(clients)
    }

    pub async fn delete_refresh_token(&self, token: &str) -> Result<bool, StorageError> {
        self.store.delete_key(&format!("{REFRESH_PREFIX}{token}")).await
    }
}

#[derive(Clone)]
struct OAuthEndpoints {
    server: Arc<dyn AuthorizationServer>,
    secret: Arc<str>,
}

async fn authorize_client(
    State(endpoints): State<OAuthEndpoints>,
    request: Request<Body>,
) -> Response {
    if !is_owner(request.headers(), &endpoints.secret) {
        return error_response(
            StatusCode::FORBIDDEN,
            "Attempted administrative access with invalid or missing key!",
        );
    }
    endpoints.server.authorize_client(request).await
}

async fn authorize(State(endpoints): State<OAuthEndpoints>, request: Request<Body>) -> Response {
    endpoints.server.authorize(request).await
}

async fn token(State(endpoints): State<OAuthEndpoints>, request: Request<Body>) -> Response {
    endpoints.server.token(request).await
}

/// Paths mounted for an API with the given (normalized) listen path.
pub fn oauth_paths(listen_path: &str) -> [String; 3] {
    [
        format!("{listen_path}tyk/oauth/authorize-client/"),
        format!("{listen_path}oauth/authorize/"),
        format!("{listen_path}oauth/token/"),
    ]
}

/// Router serving the three OAuth endpoints of one API.
pub fn oauth_router(
    listen_path: &str,
    server: Arc<dyn AuthorizationServer>,
    secret: &str,
) -> Router {
    let [authorize_client_path, authorize_path, token_path] = oauth_paths(listen_path);
    Router::new()
        .route(&authorize_client_path, any(authorize_client))
        .route(&authorize_path, any(authorize))
        .route(&token_path, any(token))
        .with_state(OAuthEndpoints {
            server,
            secret: secret.into(),
        })
}
