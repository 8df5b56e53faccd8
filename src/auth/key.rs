//! API key authentication stage.
//!
//! ```text
//! Start → Extracted ─ empty ──────────→ Rejected (401, no lookup)
//!             └─ lookup ─ not found ──→ Rejected (403, AuthFailure, KeyFailure)
//!                        └─ found ────→ Resolved (session + token in context)
//! ```

use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::apidef::{ApiDefinition, AuthSettings, BaseIdentity, SessionState};
use crate::auth::extract::{carries_form, extract_credential};
use crate::auth::session::SessionManager;
use crate::auth::AuthError;
use crate::chain::context::RequestContext;
use crate::health::{HealthCounter, HealthReporter};
use crate::http::request::origin_of as request_origin;
use crate::http::response::error_response;
use crate::observability::{metrics, EventBus, GatewayEvent};

const MAX_FORM_BYTES: usize = 1024 * 1024;

/// Per-API key authentication.
#[derive(Clone)]
pub struct AuthKey {
    api: Arc<ApiDefinition>,
    sessions: SessionManager,
    events: EventBus,
    health: Arc<HealthReporter>,
}

impl AuthKey {
    pub fn new(
        api: Arc<ApiDefinition>,
        sessions: SessionManager,
        events: EventBus,
        health: Arc<HealthReporter>,
    ) -> Self {
        Self {
            api,
            sessions,
            events,
            health,
        }
    }

    /// Resolve the caller of a request whose body (if any form data was
    /// needed) has been buffered into `form_body`.
    pub async fn resolve(
        &self,
        parts: &Parts,
        form_body: Option<&[u8]>,
    ) -> Result<(String, SessionState), AuthError> {
        let path = parts.uri.path();
        let key = extract_credential(&self.api.auth, &parts.headers, parts.uri.query(), form_body);

        if key.is_empty() {
            tracing::info!(
                api_id = %self.api.api_id,
                path,
                origin = %origin_of(parts),
                "Attempted access with malformed header, no auth header found"
            );
            metrics::record_auth_failure(&self.api.api_id, 401);
            return Err(AuthError::Missing);
        }

        match self.sessions.session_detail(&key).await {
            Ok(Some(session)) => Ok((key, session)),
            Ok(None) => {
                let origin = origin_of(parts);
                tracing::info!(
                    api_id = %self.api.api_id,
                    path,
                    origin = %origin,
                    "Attempted access with non-existent key"
                );
                self.events.fire(GatewayEvent::AuthFailure {
                    api_id: self.api.api_id.clone(),
                    path: path.to_string(),
                    origin,
                    key,
                });
                self.health.record(&self.api.api_id, HealthCounter::KeyFailure);
                metrics::record_auth_failure(&self.api.api_id, 403);
                Err(AuthError::NotAuthorised)
            }
            Err(e) => {
                tracing::error!(api_id = %self.api.api_id, error = %e, "Session lookup failed");
                Err(AuthError::Storage(e))
            }
        }
    }

    fn provides_identity(&self) -> bool {
        matches!(
            self.api.base_identity_provided_by,
            BaseIdentity::AuthToken | BaseIdentity::Unset
        )
    }
}

fn origin_of(parts: &Parts) -> String {
    request_origin(&parts.headers, &parts.extensions)
}

async fn buffer_form(
    parts: &Parts,
    settings: &AuthSettings,
    body: Body,
) -> Result<(Option<Bytes>, Body), Response> {
    if !carries_form(settings, &parts.method, &parts.headers) {
        return Ok((None, body));
    }
    match to_bytes(body, MAX_FORM_BYTES).await {
        Ok(bytes) => Ok((Some(bytes.clone()), Body::from(bytes))),
        Err(_) => Err(error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")),
    }
}

pub async fn auth_key_middleware(
    State(auth): State<AuthKey>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let (form, body) = match buffer_form(&parts, &auth.api.auth, body).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    let (key, session) = match auth.resolve(&parts, form.as_deref()).await {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    if auth.provides_identity() {
        let mut ctx = parts
            .extensions
            .remove::<RequestContext>()
            .unwrap_or_else(|| RequestContext::new(&auth.api.api_id));
        ctx.attach_session(&key, session, auth.api.enable_context_vars);
        parts.extensions.insert(ctx);
    }

    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SESSION_PREFIX;
    use crate::chain::context::TOKEN_CONTEXT_KEY;
    use crate::storage::LocalStore;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    async fn fixture(api: ApiDefinition) -> (Router, EventBus, Arc<HealthReporter>) {
        let store = LocalStore::new().with_prefix(SESSION_PREFIX);
        let sessions = SessionManager::new(Arc::new(store));
        sessions
            .update_session("good-key", &SessionState::default(), None)
            .await
            .unwrap();

        let events = EventBus::new();
        let health = Arc::new(HealthReporter::new());
        let auth = AuthKey::new(Arc::new(api), sessions, events.clone(), health.clone());

        let router = Router::new()
            .route(
                "/api/",
                get(|request: Request<Body>| async move {
                    let ctx = request
                        .extensions()
                        .get::<RequestContext>()
                        .cloned()
                        .unwrap_or_default();
                    let exposed = ctx
                        .vars
                        .get(TOKEN_CONTEXT_KEY)
                        .and_then(|v| v.as_str())
                        .unwrap_or("-")
                        .to_string();
                    format!("{}|{}", ctx.token.unwrap_or_default(), exposed)
                }),
            )
            .route("/api/form", axum::routing::post(|body: String| async move { body }))
            .layer(middleware::from_fn_with_state(auth, auth_key_middleware));
        (router, events, health)
    }

    fn api() -> ApiDefinition {
        ApiDefinition {
            api_id: "api1".into(),
            enable_context_vars: true,
            ..ApiDefinition::default()
        }
    }

    fn authorized(value: &str) -> Request<Body> {
        Request::get("/api/")
            .header("authorization", value)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_is_401() {
        let (router, _, _) = fixture(api()).await;
        let response = router.oneshot(authorized("Bearer ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Authorization field missing"));
    }

    #[tokio::test]
    async fn test_unknown_key_is_403_with_event_and_health() {
        let (router, events, health) = fixture(api()).await;
        let mut rx = events.subscribe();
        let response = router.oneshot(authorized("nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_text(response).await.contains("Key not authorised"));

        match rx.recv().await.unwrap() {
            GatewayEvent::AuthFailure { api_id, key, .. } => {
                assert_eq!(api_id, "api1");
                assert_eq!(key, "nope");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(health.snapshot("api1").key_failures_per_minute, 1.0);
    }

    #[tokio::test]
    async fn test_valid_key_sets_context() {
        let (router, _, _) = fixture(api()).await;
        let response = router.oneshot(authorized("Bearer good-key")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "good-key|good-key");
    }

    #[tokio::test]
    async fn test_other_identity_provider_leaves_context_alone() {
        let mut api = api();
        api.base_identity_provided_by = BaseIdentity::JwtClaim;
        let (router, _, _) = fixture(api).await;
        let response = router.oneshot(authorized("good-key")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "|-");
    }

    #[tokio::test]
    async fn test_form_body_param() {
        let mut api = api();
        api.auth.use_param = true;
        api.auth.param_name = "key".into();
        let (router, _, _) = fixture(api).await;
        let response = router
            .oneshot(
                Request::post("/api/form")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("key=good-key&x=1"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "key=good-key&x=1");
    }
}
