//! Owner credential gate for the control API.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::admin::AdminState;
use crate::http::request::client_origin;
use crate::http::response::error_response;

pub const ADMIN_AUTH_HEADER: &str = "x-tyk-authorization";

/// True when the request carries the gateway secret.
pub fn is_owner(headers: &HeaderMap, secret: &str) -> bool {
    !secret.is_empty()
        && headers
            .get(ADMIN_AUTH_HEADER)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|value| value == secret)
}

pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_owner(request.headers(), &state.config.secret) {
        return next.run(request).await;
    }
    tracing::warn!(
        path = %request.uri().path(),
        origin = %client_origin(&request),
        "Attempted administrative access with invalid or missing key"
    );
    error_response(
        StatusCode::FORBIDDEN,
        "Attempted administrative access with invalid or missing key!",
    )
}
