//! API key and organisation key endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::admin::{not_found, storage_failure, AdminState};
use crate::apidef::SessionState;
use crate::auth::{SessionManager, ORG_SESSION_PREFIX, SESSION_PREFIX};
use crate::http::response::{ApiModifyKeySuccess, ApiStatus};

fn sessions(state: &AdminState, prefix: &str) -> Result<SessionManager, Response> {
    state
        .storage
        .handler(prefix)
        .map(SessionManager::new)
        .map_err(storage_failure)
}

/// New key: the organisation id followed by a random hex id.
pub fn generate_key(org_id: &str) -> String {
    format!("{}{}", org_id, Uuid::new_v4().simple())
}

async fn store_session(
    state: &AdminState,
    prefix: &str,
    key: &str,
    session: &SessionState,
    action: &'static str,
) -> Response {
    let manager = match sessions(state, prefix) {
        Ok(manager) => manager,
        Err(response) => return response,
    };
    match manager.update_session(key, session, None).await {
        Ok(()) => {
            tracing::info!(prefix, action, "Session stored via control API");
            ApiModifyKeySuccess::new(key, action).into_response()
        }
        Err(e) => storage_failure(e),
    }
}

async fn fetch_session(state: &AdminState, prefix: &str, key: &str, missing: &str) -> Response {
    let manager = match sessions(state, prefix) {
        Ok(manager) => manager,
        Err(response) => return response,
    };
    match manager.session_detail(key).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => not_found(missing),
        Err(e) => storage_failure(e),
    }
}

async fn remove_session(state: &AdminState, prefix: &str, key: &str, missing: &str) -> Response {
    let manager = match sessions(state, prefix) {
        Ok(manager) => manager,
        Err(response) => return response,
    };
    match manager.remove_session(key).await {
        Ok(true) => ApiModifyKeySuccess::new(key, "deleted").into_response(),
        Ok(false) => not_found(missing),
        Err(e) => storage_failure(e),
    }
}

pub async fn create_key(
    State(state): State<AdminState>,
    Json(session): Json<SessionState>,
) -> Response {
    let key = generate_key(&session.org_id);
    store_session(&state, SESSION_PREFIX, &key, &session, "added").await
}

pub async fn list_keys(State(state): State<AdminState>) -> Response {
    let manager = match sessions(&state, SESSION_PREFIX) {
        Ok(manager) => manager,
        Err(response) => return response,
    };
    match manager.sessions("").await {
        Ok(keys) => Json(json!({ "keys": keys })).into_response(),
        Err(e) => storage_failure(e),
    }
}

pub async fn get_key(State(state): State<AdminState>, Path(key): Path<String>) -> Response {
    fetch_session(&state, SESSION_PREFIX, &key, "Key not found").await
}

pub async fn add_key(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Json(session): Json<SessionState>,
) -> Response {
    store_session(&state, SESSION_PREFIX, &key, &session, "added").await
}

pub async fn update_key(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Json(session): Json<SessionState>,
) -> Response {
    store_session(&state, SESSION_PREFIX, &key, &session, "modified").await
}

pub async fn delete_key(State(state): State<AdminState>, Path(key): Path<String>) -> Response {
    remove_session(&state, SESSION_PREFIX, &key, "Key not found").await
}

#[derive(Debug, Deserialize)]
pub struct PolicyUpdate {
    pub apply_policies: Vec<String>,
}

/// Replace the policies applied to an existing key.
pub async fn set_key_policies(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Json(update): Json<PolicyUpdate>,
) -> Response {
    let known = state.policies.snapshot();
    if let Some(unknown) = update.apply_policies.iter().find(|id| !known.contains_key(*id)) {
        tracing::warn!(policy_id = %unknown, "Key policy update references unknown policy");
        return ApiStatus::error(format!("Policy {unknown} not found"))
            .with_status(StatusCode::BAD_REQUEST);
    }

    let manager = match sessions(&state, SESSION_PREFIX) {
        Ok(manager) => manager,
        Err(response) => return response,
    };
    let mut session = match manager.session_detail(&key).await {
        Ok(Some(session)) => session,
        Ok(None) => return not_found("Key not found"),
        Err(e) => return storage_failure(e),
    };
    session.apply_policies = update.apply_policies;
    match manager.update_session(&key, &session, None).await {
        Ok(()) => ApiModifyKeySuccess::new(key, "modified").into_response(),
        Err(e) => storage_failure(e),
    }
}

pub async fn get_org_key(State(state): State<AdminState>, Path(org_id): Path<String>) -> Response {
    fetch_session(&state, ORG_SESSION_PREFIX, &org_id, "Org not found").await
}

pub async fn add_org_key(
    State(state): State<AdminState>,
    Path(org_id): Path<String>,
    Json(mut session): Json<SessionState>,
) -> Response {
    if session.org_id.is_empty() {
        session.org_id = org_id.clone();
    }
    store_session(&state, ORG_SESSION_PREFIX, &org_id, &session, "added").await
}

pub async fn delete_org_key(
    State(state): State<AdminState>,
    Path(org_id): Path<String>,
) -> Response {
    remove_session(&state, ORG_SESSION_PREFIX, &org_id, "Org not found").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_carry_org() {
        let key = generate_key("org1");
        assert!(key.starts_with("org1"));
        assert_eq!(key.len(), 4 + 32);
        assert_ne!(generate_key("org1"), key);
    }
}
