//! Gateway-generated responses.
//!
//! Errors produced by the gateway itself (not the upstream) share one JSON
//! shape: `{"error": "<message>"}`.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    (status, Json(json!({ "error": message }))).into_response()
}

/// Control API status reply, e.g. `{"status":"ok","message":"..."}`.
#[derive(Debug, Serialize)]
pub struct ApiStatus {
    pub status: &'static str,
    pub message: String,
}

impl ApiStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok",
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }

    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Control API modification reply, e.g. `{"key":"...","status":"ok","action":"added"}`.
#[derive(Debug, Serialize)]
pub struct ApiModifyKeySuccess {
    pub key: String,
    pub status: &'static str,
    pub action: &'static str,
}

impl ApiModifyKeySuccess {
    pub fn new(key: impl Into<String>, action: &'static str) -> Self {
        Self {
            key: key.into(),
            status: "ok",
            action,
        }
    }
}

impl IntoResponse for ApiModifyKeySuccess {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// True when `response` is a JSON body.
pub fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = error_response(StatusCode::FORBIDDEN, "Key not authorised");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(is_json(&response));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Key not authorised");
    }
}
