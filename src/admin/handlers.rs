//! Reload, API definition, cache and health endpoints.

use std::path::PathBuf;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::admin::{not_found, storage_failure, AdminState};
use crate::apidef::ApiDefinition;
use crate::deployment::DeploymentMode;
use crate::http::response::{ApiModifyKeySuccess, ApiStatus};
use crate::reload::ReloadOutcome;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReloadParams {
    pub block: bool,
}

async fn queue_reload(state: &AdminState, block: bool) -> Response {
    let outcome = if block {
        state.queue.trigger_and_wait().await
    } else {
        state.queue.trigger()
    };
    match outcome {
        ReloadOutcome::Queued => ApiStatus::ok("").with_status(StatusCode::OK),
        ReloadOutcome::Coalesced => {
            ApiStatus::ok("reload already queued").with_status(StatusCode::OK)
        }
        ReloadOutcome::Closed => {
            ApiStatus::error("reloads are not running").with_status(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub async fn reload(
    State(state): State<AdminState>,
    Query(params): Query<ReloadParams>,
) -> Response {
    tracing::info!(block = params.block, "Reload requested via control API");
    queue_reload(&state, params.block).await
}

/// Group reloads are handled locally; there is no cluster notification bus.
pub async fn reload_group(State(state): State<AdminState>) -> Response {
    tracing::info!("Group reload requested via control API");
    queue_reload(&state, false).await
}

pub async fn list_apis(State(state): State<AdminState>) -> Json<Vec<ApiDefinition>> {
    let snapshot = state.snapshot.load();
    Json(snapshot.apis().map(|api| api.as_ref().clone()).collect())
}

pub async fn get_api(State(state): State<AdminState>, Path(api_id): Path<String>) -> Response {
    match state.snapshot.load().get(&api_id) {
        Some(pipeline) => Json(pipeline.api().as_ref().clone()).into_response(),
        None => not_found("API not found"),
    }
}

fn definition_path(state: &AdminState, api_id: &str) -> Option<PathBuf> {
    let valid = !api_id.is_empty()
        && api_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !api_id.starts_with('.');
    valid.then(|| PathBuf::from(&state.config.app_path).join(format!("{api_id}.json")))
}

fn reject_unless_file_mode(state: &AdminState) -> Option<Response> {
    (state.mode != DeploymentMode::Standalone).then(|| {
        ApiStatus::error("Due to enabled use_db_app_configs, please use the Dashboard API")
            .with_status(StatusCode::BAD_REQUEST)
    })
}

async fn write_definition(
    state: &AdminState,
    api: &ApiDefinition,
    action: &'static str,
) -> Response {
    let Some(path) = definition_path(state, &api.api_id) else {
        return ApiStatus::error("Invalid API ID").with_status(StatusCode::BAD_REQUEST);
    };
    let encoded = match serde_json::to_vec_pretty(api) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!(api_id = %api.api_id, error = %e, "Failed to encode API definition");
            return ApiStatus::error("Failed to encode API definition")
                .with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    if let Err(e) = tokio::fs::write(&path, encoded).await {
        tracing::error!(path = %path.display(), error = %e, "Failed to write API definition");
        return ApiStatus::error("Failed to write API definition")
            .with_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
    tracing::info!(
        api_id = %api.api_id,
        path = %path.display(),
        action,
        "API definition written, reload to apply"
    );
    ApiModifyKeySuccess::new(api.api_id.clone(), action).into_response()
}

pub async fn create_api(
    State(state): State<AdminState>,
    Json(api): Json<ApiDefinition>,
) -> Response {
    if let Some(rejection) = reject_unless_file_mode(&state) {
        return rejection;
    }
    write_definition(&state, &api, "added").await
}

pub async fn update_api(
    State(state): State<AdminState>,
    Path(api_id): Path<String>,
    Json(mut api): Json<ApiDefinition>,
) -> Response {
    if let Some(rejection) = reject_unless_file_mode(&state) {
        return rejection;
    }
    api.api_id = api_id;
    write_definition(&state, &api, "modified").await
}

pub async fn delete_api(State(state): State<AdminState>, Path(api_id): Path<String>) -> Response {
    if let Some(rejection) = reject_unless_file_mode(&state) {
        return rejection;
    }
    let Some(path) = definition_path(&state, &api_id) else {
        return ApiStatus::error("Invalid API ID").with_status(StatusCode::BAD_REQUEST);
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!(api_id = %api_id, "API definition deleted, reload to apply");
            ApiModifyKeySuccess::new(api_id, "deleted").into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found("API not found"),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to delete API definition");
            ApiStatus::error("Failed to delete API definition")
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Drop every cached response of an API.
pub async fn invalidate_cache(
    State(state): State<AdminState>,
    Path(api_id): Path<String>,
) -> Response {
    let handler = match state.storage.handler(&format!("cache-{api_id}")) {
        Ok(handler) => handler,
        Err(e) => return storage_failure(e),
    };
    match handler.delete_keys("").await {
        Ok(removed) => {
            tracing::info!(api_id = %api_id, removed, "Cache invalidated");
            ApiStatus::ok("cache invalidated").with_status(StatusCode::OK)
        }
        Err(e) => storage_failure(e),
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct HealthParams {
    pub api_id: String,
}

pub async fn api_health(
    State(state): State<AdminState>,
    Query(params): Query<HealthParams>,
) -> Response {
    if params.api_id.is_empty() {
        return ApiStatus::error("missing api_id parameter").with_status(StatusCode::BAD_REQUEST);
    }
    if state.snapshot.load().get(&params.api_id).is_none() {
        return not_found("API not found");
    }
    Json(state.health.snapshot(&params.api_id)).into_response()
}
