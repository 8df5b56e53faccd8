//! OAuth client management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::admin::{not_found, storage_failure, AdminState};
use crate::chain::oauth::{oauth_prefix, OAuthClient, OAuthStorage};
use crate::http::response::{ApiModifyKeySuccess, ApiStatus};

fn storage_for(state: &AdminState, api_id: &str) -> Result<OAuthStorage, Response> {
    state
        .storage
        .handler(&oauth_prefix(api_id))
        .map(OAuthStorage::new)
        .map_err(storage_failure)
}

/// Client registration body; id and secret are generated when absent.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NewClientRequest {
    pub client_id: String,
    pub secret: String,
    pub redirect_uri: String,
    pub api_id: String,
    pub policy_id: String,
    pub meta_data: serde_json::Value,
}

pub async fn create_client(
    State(state): State<AdminState>,
    Json(request): Json<NewClientRequest>,
) -> Response {
    let oauth_enabled = state
        .snapshot
        .load()
        .get(&request.api_id)
        .map(|pipeline| pipeline.api().use_oauth2);
    match oauth_enabled {
        Some(true) => {}
        Some(false) => {
            return ApiStatus::error("API is not OAuth2 enabled")
                .with_status(StatusCode::BAD_REQUEST);
        }
        None => return ApiStatus::error("API doesn't exist").with_status(StatusCode::BAD_REQUEST),
    }
    if !request.policy_id.is_empty() && state.policies.lookup(&request.policy_id).is_none() {
        return ApiStatus::error("Policy doesn't exist").with_status(StatusCode::BAD_REQUEST);
    }

    let client = OAuthClient {
        client_id: if request.client_id.is_empty() {
            Uuid::new_v4().simple().to_string()
        } else {
            request.client_id
        },
        secret: if request.secret.is_empty() {
            Uuid::new_v4().simple().to_string()
        } else {
            request.secret
        },
        redirect_uri: request.redirect_uri,
        api_id: request.api_id,
        policy_id: request.policy_id,
        meta_data: request.meta_data,
    };

    let storage = match storage_for(&state, &client.api_id) {
        Ok(storage) => storage,
        Err(response) => return response,
    };
    match storage.set_client(&client).await {
        Ok(()) => {
            tracing::info!(
                api_id = %client.api_id,
                client_id = %client.client_id,
                "OAuth client created"
            );
            Json(client).into_response()
        }
        Err(e) => storage_failure(e),
    }
}

pub async fn list_clients(State(state): State<AdminState>, Path(api_id): Path<String>) -> Response {
    let storage = match storage_for(&state, &api_id) {
        Ok(storage) => storage,
        Err(response) => return response,
    };
    match storage.list_clients().await {
        Ok(clients) => Json(clients).into_response(),
        Err(e) => storage_failure(e),
    }
}

pub async fn get_client(
    State(state): State<AdminState>,
    Path((api_id, client_id)): Path<(String, String)>,
) -> Response {
    let storage = match storage_for(&state, &api_id) {
        Ok(storage) => storage,
        Err(response) => return response,
    };
    match storage.get_client(&client_id).await {
        Ok(Some(client)) => Json(client).into_response(),
        Ok(None) => not_found("OAuth client not found"),
        Err(e) => storage_failure(e),
    }
}

pub async fn delete_client(
    State(state): State<AdminState>,
    Path((api_id, client_id)): Path<(String, String)>,
) -> Response {
    let storage = match storage_for(&state, &api_id) {
        Ok(storage) => storage,
        Err(response) => return response,
    };
    match storage.delete_client(&client_id).await {
        Ok(true) => ApiModifyKeySuccess::new(client_id, "deleted").into_response(),
        Ok(false) => not_found("OAuth client not found"),
        Err(e) => storage_failure(e),
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RefreshParams {
    pub api_id: String,
}

pub async fn invalidate_refresh_token(
    State(state): State<AdminState>,
    Path(token): Path<String>,
    Query(params): Query<RefreshParams>,
) -> Response {
    if params.api_id.is_empty() {
        return ApiStatus::error("missing api_id parameter").with_status(StatusCode::BAD_REQUEST);
    }
    let storage = match storage_for(&state, &params.api_id) {
        Ok(storage) => storage,
        Err(response) => return response,
    };
    match storage.delete_refresh_token(&token).await {
        Ok(_) => ApiModifyKeySuccess::new(token, "deleted").into_response(),
        Err(e) => storage_failure(e),
    }
}
