//! Batch endpoint: several requests in one call, each run through the API's
//! own pipeline.

use std::collections::HashMap;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

use crate::http::response::error_response;

const MAX_REPLY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BatchRequest {
    pub requests: Vec<BatchRequestItem>,
    pub suppress_parallel_execution: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BatchRequestItem {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub relative_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReply {
    pub relative_url: String,
    pub code: u16,
    pub headers: HashMap<String, Vec<String>>,
    pub body: String,
}

impl BatchReply {
    fn failed(item: &BatchRequestItem, code: StatusCode, message: String) -> Self {
        Self {
            relative_url: item.relative_url.clone(),
            code: code.as_u16(),
            headers: HashMap::new(),
            body: message,
        }
    }
}

pub fn batch_path(listen_path: &str) -> String {
    format!("{listen_path}tyk/batch/")
}

#[derive(Clone)]
struct BatchState {
    listen_path: String,
    chain: Router,
}

impl BatchState {
    fn target(&self, relative_url: &str) -> String {
        format!("{}{}", self.listen_path, relative_url.trim_start_matches('/'))
    }

    async fn dispatch(&self, item: &BatchRequestItem) -> BatchReply {
        let method = if item.method.is_empty() {
            Ok(Method::GET)
        } else {
            Method::from_bytes(item.method.to_uppercase().as_bytes())
        };
        let Ok(method) = method else {
            let message = format!("invalid method {}", item.method);
            return BatchReply::failed(item, StatusCode::BAD_REQUEST, message);
        };

        let mut builder = Request::builder().method(method).uri(self.target(&item.relative_url));
        for (name, value) in &item.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = match builder.body(Body::from(item.body.clone())) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    relative_url = %item.relative_url,
                    error = %e,
                    "Invalid batch request item"
                );
                return BatchReply::failed(item, StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        let response = self
            .chain
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|e| match e {});
        let (parts, body) = response.into_parts();

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in &parts.headers {
            headers
                .entry(name.to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let body = match to_bytes(body, MAX_REPLY_BYTES).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!(
                    relative_url = %item.relative_url,
                    error = %e,
                    "Failed to read batch reply body"
                );
                String::new()
            }
        };

        BatchReply {
            relative_url: item.relative_url.clone(),
            code: parts.status.as_u16(),
            headers,
            body,
        }
    }
}

async fn handle_batch(State(state): State<BatchState>, body: Bytes) -> Response {
    let batch: BatchRequest = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!(error = %e, "Could not decode batch request");
            return error_response(StatusCode::BAD_REQUEST, "Batch request malformed");
        }
    };

    let replies = if batch.suppress_parallel_execution {
        let mut replies = Vec::with_capacity(batch.requests.len());
        for item in &batch.requests {
            replies.push(state.dispatch(item).await);
        }
        replies
    } else {
        join_all(batch.requests.iter().map(|item| state.dispatch(item))).await
    };

    tracing::debug!(requests = replies.len(), "Batch request complete");
    Json(replies).into_response()
}

/// Router serving `<listen_path>tyk/batch/`, dispatching into `chain`.
pub fn batch_router(listen_path: &str, chain: Router) -> Router {
    Router::new()
        .route(&batch_path(listen_path), post(handle_batch))
        .with_state(BatchState {
            listen_path: listen_path.to_string(),
            chain,
        })
}
