//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Mount the control API under `/tyk`
//! - Dispatch every other request to the pipeline of the matching API
//! - Wire up cross-cutting layers (timeout, request id, tracing)
//! - Serve with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::{admin_router, AdminState};
use crate::http::request::request_id;
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::registry::SharedSnapshot;

#[derive(Clone)]
struct Dispatch {
    snapshot: SharedSnapshot,
}

fn request_host<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .map(str::to_string)
}

/// Route a request to the API pipeline matching its host and path. The
/// snapshot is read once, so a concurrent reload never mixes generations.
async fn dispatch(State(state): State<Dispatch>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let snapshot = state.snapshot.load_full();
    let host = request_host(&request);
    let path = request.uri().path().to_string();
    let method = request.method().to_string();

    let Some(pipeline) = snapshot.match_request(host.as_deref(), &path) else {
        tracing::debug!(request_id = %request_id(&request), path = %path, "No API matches request");
        metrics::record_request("none", &method, 404, started);
        return error_response(StatusCode::NOT_FOUND, "Not found");
    };

    let api_id = pipeline.api().api_id.clone();
    tracing::debug!(
        request_id = %request_id(&request),
        api_id = %api_id,
        path = %path,
        "Dispatching request"
    );
    let response = pipeline.handle(request).await;
    metrics::record_request(&api_id, &method, response.status().as_u16(), started);
    response
}

/// Gateway router: control API plus per-API dispatch.
#[allow(deprecated)]
pub fn gateway_router(admin: AdminState, request_timeout: Duration) -> Router {
    let dispatch_state = Dispatch {
        snapshot: admin.snapshot.clone(),
    };
    Router::new()
        .fallback(dispatch)
        .with_state(dispatch_state)
        .nest("/tyk", admin_router(admin))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(admin: AdminState) -> Self {
        let timeout = Duration::from_secs(admin.config.timeouts.request_secs.max(1));
        Self {
            router: gateway_router(admin, timeout),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
