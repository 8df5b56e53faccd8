//! Per-request processing context carried between pipeline stages.

use axum::http::Request;
use serde_json::{Map, Value};

use crate::apidef::SessionState;

/// Context key under which the raw token is exposed when context variables
/// are enabled.
pub const TOKEN_CONTEXT_KEY: &str = "token";

/// State accumulated while a request moves through an API pipeline.
///
/// Lives in the request extensions; each stage reads and writes it there.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub api_id: String,
    pub session: Option<SessionState>,
    pub token: Option<String>,
    pub vars: Map<String, Value>,
}

impl RequestContext {
    pub fn new(api_id: &str) -> Self {
        Self {
            api_id: api_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Attach a resolved session and its token.
    pub fn attach_session(&mut self, token: &str, session: SessionState, expose_token: bool) {
        self.token = Some(token.to_string());
        self.session = Some(session);
        if expose_token {
            self.vars
                .insert(TOKEN_CONTEXT_KEY.to_string(), Value::String(token.to_string()));
        }
    }

    /// Context of `request`, or an empty one for `api_id`.
    pub fn of<B>(request: &Request<B>, api_id: &str) -> Self {
        request
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| Self::new(api_id))
    }
}
