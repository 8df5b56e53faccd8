//! Assemble the pipeline for one API definition.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::Router;
use tower::{Layer, ServiceExt};
use tower_http::cors::Cors;

use crate::apidef::{ApiDefinition, MiddlewareDescriptor};
use crate::auth::{
    access_middleware, auth_key_middleware, AccessCheck, AuthKey, SessionManager, SESSION_PREFIX,
};
use crate::chain::batch::{batch_path, batch_router};
use crate::chain::cors::create_cors_layer;
use crate::chain::custom::resolve_middleware;
use crate::chain::hooks::{
    auth_check_middleware, hook_middleware, HookChain, HookStage, ScriptRuntime,
};
use crate::chain::oauth::{
    oauth_paths, oauth_prefix, oauth_router, OAuthServerConfig, OAuthServerFactory, OAuthStorage,
    UnconfiguredOAuth,
};
use crate::chain::proxy::{upstream_handler, HyperProxy, UpstreamProxy, UpstreamStage};
use crate::chain::response::{response_middleware, ResponseChain, ResponseProcessorRegistry};
use crate::chain::ChainError;
use crate::config::GatewayConfig;
use crate::health::HealthReporter;
use crate::observability::{AnalyticsRecorder, EventBus};
use crate::policy::PolicyMap;
use crate::storage::StorageFactory;

/// Global settings every pipeline needs.
#[derive(Debug, Clone, Default)]
pub struct ChainSettings {
    pub secret: String,
    pub middleware_path: String,
    pub oauth_redirect_uri_separator: String,
}

impl ChainSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            middleware_path: config.middleware_path.clone(),
            oauth_redirect_uri_separator: config.oauth_redirect_uri_separator.clone(),
        }
    }
}

/// Routable pipeline of one API.
#[derive(Clone)]
pub struct ApiPipeline {
    api: Arc<ApiDefinition>,
    router: Router,
    cors: Option<Cors<Router>>,
    options_passthrough: bool,
    mounted: Vec<String>,
}

impl ApiPipeline {
    pub fn api(&self) -> &Arc<ApiDefinition> {
        &self.api
    }

    /// Control paths mounted under the listen path (OAuth, batch).
    pub fn mounted_paths(&self) -> &[String] {
        &self.mounted
    }

    pub async fn handle(&self, request: Request<Body>) -> Response {
        match &self.cors {
            Some(cors) if !(self.options_passthrough && request.method() == Method::OPTIONS) => {
                cors.clone().oneshot(request).await.unwrap_or_else(|e| match e {})
            }
            _ => self
                .router
                .clone()
                .oneshot(request)
                .await
                .unwrap_or_else(|e| match e {}),
        }
    }
}

/// Hooks of every stage, instantiated.
struct StageHooks {
    pre: HookChain,
    auth_check: Option<HookChain>,
    post_key_auth: HookChain,
    post: HookChain,
}

/// Builds [`ApiPipeline`]s from definitions and shared collaborators.
#[derive(Clone)]
pub struct ChainBuilder {
    settings: ChainSettings,
    storage: StorageFactory,
    scripts: Option<Arc<dyn ScriptRuntime>>,
    oauth: Arc<dyn OAuthServerFactory>,
    upstream: Arc<dyn UpstreamProxy>,
    processors: Arc<ResponseProcessorRegistry>,
    events: EventBus,
    health: Arc<HealthReporter>,
    analytics: Option<AnalyticsRecorder>,
}

impl ChainBuilder {
    pub fn new(settings: ChainSettings, storage: StorageFactory) -> Self {
        Self {
            settings,
            storage,
            scripts: None,
            oauth: Arc::new(UnconfiguredOAuth),
            upstream: Arc::new(HyperProxy::new()),
            processors: Arc::new(ResponseProcessorRegistry::default()),
            events: EventBus::new(),
            health: Arc::new(HealthReporter::new()),
            analytics: None,
        }
    }

    pub fn with_script_runtime(mut self, runtime: Arc<dyn ScriptRuntime>) -> Self {
        self.scripts = Some(runtime);
        self
    }

    pub fn with_oauth_server(mut self, factory: Arc<dyn OAuthServerFactory>) -> Self {
        self.oauth = factory;
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamProxy>) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_response_processors(mut self, registry: ResponseProcessorRegistry) -> Self {
        self.processors = Arc::new(registry);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_health(mut self, health: Arc<HealthReporter>) -> Self {
        self.health = health;
        self
    }

    pub fn with_analytics(mut self, analytics: AnalyticsRecorder) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn storage(&self) -> &StorageFactory {
        &self.storage
    }

    fn load_stage(
        &self,
        api: &ApiDefinition,
        stage: HookStage,
        descriptors: &[MiddlewareDescriptor],
    ) -> Result<HookChain, ChainError> {
        let mut hooks = Vec::with_capacity(descriptors.len());
        if !descriptors.is_empty() {
            let runtime = self.scripts.as_ref().ok_or_else(|| ChainError::MissingScriptRuntime {
                api_id: api.api_id.clone(),
            })?;
            for descriptor in descriptors {
                hooks.push(runtime.load(api, stage, descriptor)?);
            }
        }
        Ok(HookChain::new(&api.api_id, stage, hooks))
    }

    fn load_hooks(&self, api: &ApiDefinition) -> Result<StageHooks, ChainError> {
        let resolved = resolve_middleware(api, &self.settings.middleware_path);
        let auth_check = match &resolved.auth_check {
            Some(descriptor) => Some(self.load_stage(
                api,
                HookStage::AuthCheck,
                std::slice::from_ref(descriptor),
            )?),
            None => None,
        };
        Ok(StageHooks {
            pre: self.load_stage(api, HookStage::Pre, &resolved.pre)?,
            auth_check,
            post_key_auth: self.load_stage(api, HookStage::PostKeyAuth, &resolved.post_key_auth)?,
            post: self.load_stage(api, HookStage::Post, &resolved.post)?,
        })
    }

    /// Build the pipeline of `spec`. Layers are added innermost first.
    pub fn build(
        &self,
        spec: &ApiDefinition,
        policies: Arc<PolicyMap>,
    ) -> Result<ApiPipeline, ChainError> {
        let api = Arc::new(spec.clone());
        let listen_path = api.proxy.listen_path.as_str();
        let hooks = self.load_hooks(&api)?;
        let responses =
            ResponseChain::build(&api.api_id, &api.response_processors, &self.processors)?;

        let upstream = UpstreamStage {
            api: api.clone(),
            proxy: self.upstream.clone(),
            health: self.health.clone(),
            analytics: self.analytics.clone(),
        };
        let mut chain = Router::new().fallback(upstream_handler).with_state(upstream);

        if !responses.is_empty() {
            chain = chain.layer(from_fn_with_state(responses, response_middleware));
        }
        if !hooks.post.is_empty() {
            chain = chain.layer(from_fn_with_state(hooks.post, hook_middleware));
        }
        if !api.use_keyless {
            let access = AccessCheck::new(&api.api_id, policies);
            chain = chain.layer(from_fn_with_state(access, access_middleware));
        }
        if !hooks.post_key_auth.is_empty() {
            chain = chain.layer(from_fn_with_state(hooks.post_key_auth, hook_middleware));
        }
        if let Some(auth_check) = hooks.auth_check {
            chain = chain.layer(from_fn_with_state(auth_check, auth_check_middleware));
        } else if !api.use_keyless {
            let store = self
                .storage
                .handler_for(api.session_provider.storage_engine, SESSION_PREFIX)?;
            let auth = AuthKey::new(
                api.clone(),
                SessionManager::new(store),
                self.events.clone(),
                self.health.clone(),
            );
            chain = chain.layer(from_fn_with_state(auth, auth_key_middleware));
        }
        if !hooks.pre.is_empty() {
            chain = chain.layer(from_fn_with_state(hooks.pre, hook_middleware));
        }

        let mut router = Router::new();
        let mut mounted = Vec::new();

        if api.use_oauth2 {
            let storage = OAuthStorage::new(self.storage.handler(&oauth_prefix(&api.api_id))?);
            let config =
                OAuthServerConfig::for_api(&api, &self.settings.oauth_redirect_uri_separator);
            let server = self.oauth.build(config, storage);
            router = router.merge(oauth_router(listen_path, server, &self.settings.secret));
            mounted.extend(oauth_paths(listen_path));
            tracing::debug!(api_id = %api.api_id, "OAuth endpoints mounted");
        }
        if api.enable_batch_request_support {
            router = router.merge(batch_router(listen_path, chain.clone()));
            mounted.push(batch_path(listen_path));
            tracing::debug!(api_id = %api.api_id, "Batch requests enabled for API");
        }
        let router = router.fallback_service(chain);

        let cors = api.cors.enable.then(|| create_cors_layer(&api.cors).layer(router.clone()));

        tracing::debug!(
            api_id = %api.api_id,
            listen_path,
            keyless = api.use_keyless,
            mounted = mounted.len(),
            "Pipeline built"
        );

        Ok(ApiPipeline {
            options_passthrough: api.cors.options_passthrough,
            api,
            router,
            cors,
            mounted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apidef::{AccessDefinition, ResponseProcessorDef, SessionState};
    use crate::chain::context::RequestContext;
    use crate::chain::hooks::test_support::RecordingRuntime;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use serde_json::{json, Value};

    struct EchoUpstream;

    #[async_trait]
    impl UpstreamProxy for EchoUpstream {
        async fn forward(&self, api: &ApiDefinition, request: Request<Body>) -> Response {
            let ctx = RequestContext::of(&request, &api.api_id);
            Json(json!({
                "path": request.uri().path(),
                "token": ctx.token,
                "trail": ctx.vars.get("trail"),
            }))
            .into_response()
        }
    }

    fn api(api_id: &str) -> ApiDefinition {
        let mut api = ApiDefinition {
            api_id: api_id.into(),
            ..ApiDefinition::default()
        };
        api.proxy.listen_path = format!("/{api_id}/");
        api
    }

    fn builder(store: &LocalStore) -> ChainBuilder {
        ChainBuilder::new(ChainSettings::default(), StorageFactory::local_only(store.clone()))
            .with_upstream(Arc::new(EchoUpstream))
            .with_script_runtime(Arc::new(RecordingRuntime))
    }

    async fn seed_session(store: &LocalStore, key: &str, session: &SessionState) {
        let sessions = SessionManager::new(Arc::new(store.with_prefix(SESSION_PREFIX)));
        sessions.update_session(key, session, None).await.unwrap();
    }

    async fn call(pipeline: &ApiPipeline, request: Request<Body>) -> (StatusCode, Value) {
        let response = pipeline.handle(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(path: &str) -> axum::http::request::Builder {
        Request::get(path)
    }

    #[tokio::test]
    async fn test_keyed_pipeline() {
        let store = LocalStore::new();
        seed_session(&store, "known", &SessionState::default()).await;
        let pipeline = builder(&store).build(&api("api1"), Arc::default()).unwrap();

        let (status, body) = call(&pipeline, get("/api1/x").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authorization field missing");

        let (status, _) = call(
            &pipeline,
            get("/api1/x").header("authorization", "unknown").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &pipeline,
            get("/api1/x").header("authorization", "Bearer known").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], "known");
    }

    #[tokio::test]
    async fn test_access_rights_enforced() {
        let store = LocalStore::new();
        let mut session = SessionState::default();
        session.access_rights.insert("other".into(), AccessDefinition::default());
        seed_session(&store, "narrow", &session).await;
        let pipeline = builder(&store).build(&api("api1"), Arc::default()).unwrap();

        let (status, body) = call(
            &pipeline,
            get("/api1/x").header("authorization", "narrow").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Access to this API has been disallowed");
    }

    #[tokio::test]
    async fn test_hooks_run_around_auth() {
        let store = LocalStore::new();
        let mut spec = api("api1");
        spec.use_keyless = true;
        spec.custom_middleware.pre = vec![MiddlewareDescriptor {
            name: "first".into(),
            ..MiddlewareDescriptor::default()
        }];
        spec.custom_middleware.post = vec![MiddlewareDescriptor {
            name: "last".into(),
            ..MiddlewareDescriptor::default()
        }];
        let pipeline = builder(&store).build(&spec, Arc::default()).unwrap();

        let (status, body) = call(&pipeline, get("/api1/x").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trail"], "first,last");
        assert_eq!(body["token"], Value::Null);
    }

    #[tokio::test]
    async fn test_pre_hook_runs_before_auth() {
        let store = LocalStore::new();
        let mut spec = api("api1");
        spec.custom_middleware.pre = vec![MiddlewareDescriptor {
            name: "reject_early".into(),
            ..MiddlewareDescriptor::default()
        }];
        let pipeline = builder(&store).build(&spec, Arc::default()).unwrap();
        let (status, _) = call(&pipeline, get("/api1/x").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_auth_check_hook_replaces_key_lookup() {
        let store = LocalStore::new();
        let mut spec = api("api1");
        spec.custom_middleware.auth_check = MiddlewareDescriptor {
            name: "grant_all".into(),
            ..MiddlewareDescriptor::default()
        };
        let pipeline = builder(&store).build(&spec, Arc::default()).unwrap();
        let (status, body) = call(&pipeline, get("/api1/x").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], "hook-token");

        spec.custom_middleware.auth_check.name = "deny_all".into();
        let pipeline = builder(&store).build(&spec, Arc::default()).unwrap();
        let (status, _) = call(&pipeline, get("/api1/x").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_build_failures() {
        let store = LocalStore::new();
        let mut spec = api("api1");
        spec.response_processors = vec![ResponseProcessorDef {
            name: "no_such_processor".into(),
            options: Value::Null,
        }];
        assert!(matches!(
            builder(&store).build(&spec, Arc::default()),
            Err(ChainError::UnknownResponseProcessor(name)) if name == "no_such_processor"
        ));

        let mut spec = api("api2");
        spec.custom_middleware.pre = vec![MiddlewareDescriptor {
            name: "pre".into(),
            ..MiddlewareDescriptor::default()
        }];
        let without_runtime =
            ChainBuilder::new(ChainSettings::default(), StorageFactory::local_only(store));
        assert!(matches!(
            without_runtime.build(&spec, Arc::default()),
            Err(ChainError::MissingScriptRuntime { .. })
        ));
    }

    #[tokio::test]
    async fn test_mounted_paths() {
        let store = LocalStore::new();
        let mut spec = api("api1");
        spec.use_oauth2 = true;
        spec.enable_batch_request_support = true;
        let pipeline = builder(&store).build(&spec, Arc::default()).unwrap();
        assert_eq!(
            pipeline.mounted_paths(),
            &[
                "/api1/tyk/oauth/authorize-client/".to_string(),
                "/api1/oauth/authorize/".to_string(),
                "/api1/oauth/token/".to_string(),
                "/api1/tyk/batch/".to_string(),
            ]
        );

        let request = Request::post("/api1/oauth/token/")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&pipeline, request).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let store = LocalStore::new();
        let mut spec = api("api1");
        spec.use_keyless = true;
        spec.cors.enable = true;
        spec.cors.allowed_origins = vec!["http://app.example".into()];
        let preflight = || {
            Request::options("/api1/x")
                .header("origin", "http://app.example")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap()
        };

        let pipeline = builder(&store).build(&spec, Arc::default()).unwrap();
        let response = pipeline.handle(preflight()).await;
        assert_eq!(response.headers()["access-control-allow-origin"], "http://app.example");

        spec.cors.options_passthrough = true;
        let pipeline = builder(&store).build(&spec, Arc::default()).unwrap();
        let (status, body) = call(&pipeline, preflight()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "/api1/x");
    }
}
