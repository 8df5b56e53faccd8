//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use api_gateway::admin::AdminState;
use api_gateway::apidef::{ApiDefinition, Policy};
use api_gateway::chain::{ChainBuilder, ChainSettings, UpstreamProxy};
use api_gateway::config::{AuthOverrideConfig, GatewayConfig};
use api_gateway::deployment::DeploymentMode;
use api_gateway::health::HealthReporter;
use api_gateway::observability::analytics::ANALYTICS_PREFIX;
use api_gateway::observability::AnalyticsRecorder;
use api_gateway::policy::PolicyStore;
use api_gateway::registry::{empty_snapshot, SharedSnapshot};
use api_gateway::reload::{ReloadQueue, ReloadReceiver, Reloader};
use api_gateway::sources::{ConfigSource, Sources};
use api_gateway::storage::{LocalStore, StorageFactory};

pub const SECRET: &str = "test-secret";

/// Upstream that answers with the API id and the path it received.
pub struct EchoUpstream;

#[async_trait]
impl UpstreamProxy for EchoUpstream {
    async fn forward(&self, api: &ApiDefinition, request: Request<Body>) -> Response {
        Json(json!({
            "api_id": api.api_id,
            "name": api.name,
            "path": request.uri().path(),
        }))
        .into_response()
    }
}

/// Source whose contents tests can swap between reloads.
#[derive(Default)]
pub struct ScriptedSource {
    apis: Mutex<Option<Vec<ApiDefinition>>>,
    policies: Mutex<Option<Vec<(String, Policy)>>>,
    pub api_loads: AtomicUsize,
}

impl ScriptedSource {
    pub fn set_apis(&self, apis: Option<Vec<ApiDefinition>>) {
        *self.apis.lock().unwrap() = apis;
    }

    pub fn set_policies(&self, policies: Option<Vec<(String, Policy)>>) {
        *self.policies.lock().unwrap() = policies;
    }
}

#[async_trait]
impl ConfigSource for ScriptedSource {
    async fn load_api_definitions(&self) -> Option<Vec<ApiDefinition>> {
        self.api_loads.fetch_add(1, Ordering::SeqCst);
        self.apis.lock().unwrap().clone()
    }

    async fn load_policies(&self) -> Option<Vec<(String, Policy)>> {
        self.policies.lock().unwrap().clone()
    }
}

pub fn keyless_api(api_id: &str, listen_path: &str) -> ApiDefinition {
    let mut api = ApiDefinition {
        api_id: api_id.into(),
        name: api_id.into(),
        use_keyless: true,
        ..ApiDefinition::default()
    };
    api.proxy.listen_path = listen_path.into();
    api
}

pub fn keyed_api(api_id: &str, listen_path: &str) -> ApiDefinition {
    ApiDefinition {
        use_keyless: false,
        ..keyless_api(api_id, listen_path)
    }
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        secret: SECRET.into(),
        ..GatewayConfig::default()
    }
}

/// Standalone wiring around a scripted source, without any background task.
pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub store: LocalStore,
    pub snapshot: SharedSnapshot,
    pub policies: Arc<PolicyStore>,
    pub reloader: Arc<Reloader>,
    pub admin: AdminState,
    pub receiver: Option<ReloadReceiver>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        let source = Arc::new(ScriptedSource::default());
        let store = LocalStore::new();
        let storage = StorageFactory::local_only(store.clone());
        let snapshot = empty_snapshot();
        let policies = Arc::new(PolicyStore::new());
        let sources = Sources {
            apis: source.clone(),
            policies: source.clone(),
        };
        let mut builder = ChainBuilder::new(ChainSettings::from_config(&config), storage.clone())
            .with_upstream(Arc::new(EchoUpstream));
        if config.enable_analytics {
            let analytics = Arc::new(store.with_prefix(ANALYTICS_PREFIX));
            builder = builder.with_analytics(AnalyticsRecorder::new(analytics));
        }
        let reloader = Arc::new(Reloader::new(
            sources,
            AuthOverrideConfig::default(),
            policies.clone(),
            builder,
            snapshot.clone(),
        ));
        let (queue, receiver) = ReloadQueue::channel();
        let admin = AdminState {
            config: Arc::new(config),
            mode: DeploymentMode::Standalone,
            queue,
            snapshot: snapshot.clone(),
            storage,
            policies: policies.clone(),
            health: Arc::new(HealthReporter::new()),
        };
        Self {
            source,
            store,
            snapshot,
            policies,
            reloader,
            admin,
            receiver: Some(receiver),
        }
    }
}

/// Send one request through `router`, returning status and JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Mock control plane: registration, ping, API and policy lists.
#[derive(Clone, Default)]
pub struct MockDashboard {
    pub forbid: Arc<AtomicBool>,
    pub registrations: Arc<AtomicUsize>,
    pub apis: Arc<Mutex<Vec<ApiDefinition>>>,
    pub policies: Arc<Mutex<Vec<Policy>>>,
}

fn checked(dash: &MockDashboard, headers: &HeaderMap) -> Result<(), StatusCode> {
    let authorised = headers.get("authorization").is_some_and(|v| v == SECRET);
    if !authorised || dash.forbid.load(Ordering::SeqCst) {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(())
}

async fn register(State(dash): State<MockDashboard>, headers: HeaderMap) -> Response {
    if let Err(status) = checked(&dash, &headers) {
        return status.into_response();
    }
    let n = dash.registrations.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "Status": "ok",
        "Message": {"NodeID": format!("node-{n}")},
        "Nonce": "n0"
    }))
    .into_response()
}

async fn ping(State(dash): State<MockDashboard>, headers: HeaderMap) -> Response {
    if let Err(status) = checked(&dash, &headers) {
        return status.into_response();
    }
    Json(json!({"Nonce": "ping"})).into_response()
}

async fn apis(State(dash): State<MockDashboard>, headers: HeaderMap) -> Response {
    if let Err(status) = checked(&dash, &headers) {
        return status.into_response();
    }
    let items: Vec<Value> = dash
        .apis
        .lock()
        .unwrap()
        .iter()
        .map(|api| json!({ "api_definition": api }))
        .collect();
    Json(json!({"Message": items, "Nonce": "n1"})).into_response()
}

async fn policies(State(dash): State<MockDashboard>, headers: HeaderMap) -> Response {
    if let Err(status) = checked(&dash, &headers) {
        return status.into_response();
    }
    let items = dash.policies.lock().unwrap().clone();
    Json(json!({"Message": items, "Nonce": "n2"})).into_response()
}

impl MockDashboard {
    /// Serve on an ephemeral port and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/register/node", post(register))
            .route("/register/ping", get(ping))
            .route("/system/apis", get(apis))
            .route("/system/policies", get(policies))
            .with_state(self.clone());
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }
}

/// Mock management node speaking JSON-RPC over HTTP.
#[derive(Clone, Default)]
pub struct MockRpc {
    pub down: Arc<AtomicBool>,
    pub apis: Arc<Mutex<Vec<ApiDefinition>>>,
    pub policies: Arc<Mutex<Vec<Policy>>>,
    pub keys: Arc<Mutex<HashMap<String, String>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

async fn rpc_call(State(rpc): State<MockRpc>, Json(request): Json<Value>) -> Response {
    if rpc.down.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    rpc.calls.lock().unwrap().push(method.clone());

    let result = match method.as_str() {
        "Login" | "Ping" => json!(true),
        "CheckReload" => json!(false),
        "GetApiDefinitions" => {
            let items: Vec<Value> = rpc
                .apis
                .lock()
                .unwrap()
                .iter()
                .map(|api| json!({ "api_definition": api }))
                .collect();
            json!(Value::Array(items).to_string())
        }
        "GetPolicies" => json!(serde_json::to_string(&*rpc.policies.lock().unwrap()).unwrap()),
        "GetKey" => {
            let key = params[0].as_str().unwrap_or_default();
            json!(rpc.keys.lock().unwrap().get(key).cloned())
        }
        "SetKey" => {
            let key = params[0].as_str().unwrap_or_default().to_string();
            let value = params[1].as_str().unwrap_or_default().to_string();
            rpc.keys.lock().unwrap().insert(key, value);
            json!(true)
        }
        "DeleteKey" => {
            let key = params[0].as_str().unwrap_or_default();
            json!(rpc.keys.lock().unwrap().remove(key).is_some())
        }
        other => {
            let error = json!({ "code": -32601, "message": format!("unknown method {other}") });
            return Json(json!({ "result": null, "error": error })).into_response();
        }
    };
    Json(json!({ "result": result, "error": null })).into_response()
}

impl MockRpc {
    /// Serve on an ephemeral port and return the endpoint URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new().route("/", post(rpc_call)).with_state(self.clone());
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/", addr)
    }
}
