//! Custom script hooks.
//!
//! The interpreter that executes hook code lives outside the gateway. It is
//! plugged in through [`ScriptRuntime`], which turns descriptors into
//! [`ScriptHook`]s with a uniform `(request, context) -> context | error`
//! contract.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::apidef::{ApiDefinition, MiddlewareDescriptor};
use crate::auth::AuthError;
use crate::chain::context::RequestContext;
use crate::http::response::error_response;

/// Position of a hook in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Pre,
    AuthCheck,
    PostKeyAuth,
    Post,
}

#[derive(Debug, Error)]
pub enum HookError {
    /// The hook decided the request must not continue.
    #[error("hook {name} rejected the request: {message}")]
    Rejected {
        name: String,
        status: u16,
        message: String,
    },

    #[error("hook {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("failed to load hook {name} from {path}: {message}")]
    Load {
        name: String,
        path: String,
        message: String,
    },
}

#[async_trait]
pub trait ScriptHook: Send + Sync {
    fn descriptor(&self) -> &MiddlewareDescriptor;

    async fn invoke(
        &self,
        request: &mut Parts,
        ctx: RequestContext,
    ) -> Result<RequestContext, HookError>;
}

/// Loads hooks for an API.
pub trait ScriptRuntime: Send + Sync {
    fn load(
        &self,
        api: &ApiDefinition,
        stage: HookStage,
        descriptor: &MiddlewareDescriptor,
    ) -> Result<Arc<dyn ScriptHook>, HookError>;
}

/// Ordered hooks of one stage, shared as middleware state.
#[derive(Clone)]
pub struct HookChain {
    api_id: Arc<str>,
    stage: HookStage,
    hooks: Arc<[Arc<dyn ScriptHook>]>,
}

impl HookChain {
    pub fn new(api_id: &str, stage: HookStage, hooks: Vec<Arc<dyn ScriptHook>>) -> Self {
        Self {
            api_id: api_id.into(),
            stage,
            hooks: hooks.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Run every hook in order, threading the context through.
    pub async fn run(&self, parts: &mut Parts) -> Result<(), HookError> {
        let mut ctx = parts
            .extensions
            .remove::<RequestContext>()
            .unwrap_or_else(|| RequestContext::new(&self.api_id));
        for hook in self.hooks.iter() {
            tracing::trace!(
                api_id = %self.api_id,
                stage = ?self.stage,
                hook = %hook.descriptor().name,
                "Invoking hook"
            );
            ctx = hook.invoke(parts, ctx).await?;
        }
        parts.extensions.insert(ctx);
        Ok(())
    }
}

pub(crate) fn hook_error_response(api_id: &str, error: HookError) -> Response {
    match error {
        HookError::Rejected { status, message, .. } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN);
            error_response(status, message)
        }
        e => {
            tracing::error!(api_id, error = %e, "Hook failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "There was a problem proxying the request",
            )
        }
    }
}

pub async fn hook_middleware(
    State(chain): State<HookChain>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    if let Err(e) = chain.run(&mut parts).await {
        return hook_error_response(&chain.api_id, e);
    }
    next.run(Request::from_parts(parts, body)).await
}

/// Auth stage backed by a hook: the hook must leave a session in the context.
pub async fn auth_check_middleware(
    State(chain): State<HookChain>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    if let Err(e) = chain.run(&mut parts).await {
        return hook_error_response(&chain.api_id, e);
    }
    let authenticated = parts
        .extensions
        .get::<RequestContext>()
        .is_some_and(RequestContext::is_authenticated);
    if !authenticated {
        tracing::info!(
            api_id = %chain.api_id,
            path = parts.uri.path(),
            "Auth check hook did not establish a session"
        );
        return AuthError::NotAuthorised.into_response();
    }
    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::apidef::SessionState;

    /// Hook that records its name in the context and can reject or grant a session.
    pub struct RecordingHook {
        pub descriptor: MiddlewareDescriptor,
        pub reject: bool,
        pub grant_session: bool,
    }

    #[async_trait]
    impl ScriptHook for RecordingHook {
        fn descriptor(&self) -> &MiddlewareDescriptor {
            &self.descriptor
        }

        async fn invoke(
            &self,
            request: &mut Parts,
            mut ctx: RequestContext,
        ) -> Result<RequestContext, HookError> {
            if self.reject {
                return Err(HookError::Rejected {
                    name: self.descriptor.name.clone(),
                    status: 400,
                    message: "rejected by hook".into(),
                });
            }
            let trail = match ctx.vars.get("trail").and_then(|v| v.as_str()) {
                Some(prev) => format!("{},{}", prev, self.descriptor.name),
                None => self.descriptor.name.clone(),
            };
            ctx.vars.insert("trail".into(), trail.clone().into());
            if let Ok(value) = trail.parse() {
                request.headers.insert("x-hook-trail", value);
            }
            if self.grant_session {
                ctx.attach_session("hook-token", SessionState::default(), false);
            }
            Ok(ctx)
        }
    }

    /// Runtime that loads [`RecordingHook`]s; names starting with `reject`
    /// reject, names containing `grant` attach a session.
    pub struct RecordingRuntime;

    impl ScriptRuntime for RecordingRuntime {
        fn load(
            &self,
            _api: &ApiDefinition,
            _stage: HookStage,
            descriptor: &MiddlewareDescriptor,
        ) -> Result<Arc<dyn ScriptHook>, HookError> {
            Ok(Arc::new(RecordingHook {
                descriptor: descriptor.clone(),
                reject: descriptor.name.starts_with("reject"),
                grant_session: descriptor.name.contains("grant"),
            }))
        }
    }
}
