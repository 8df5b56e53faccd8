//! Final pipeline stage: hand the request to the upstream.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::uri::InvalidUri;
use axum::http::{header, HeaderValue, Request, StatusCode, Uri};
use axum::response::Response;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::apidef::{ApiDefinition, ProxySettings};
use crate::chain::context::RequestContext;
use crate::health::{HealthCounter, HealthReporter};
use crate::http::request::client_origin;
use crate::http::response::error_response;
use crate::observability::{AnalyticsRecord, AnalyticsRecorder};

/// Forwards a request that passed the pipeline.
#[async_trait]
pub trait UpstreamProxy: Send + Sync {
    async fn forward(&self, api: &ApiDefinition, request: Request<Body>) -> Response;
}

const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// Upstream URI for a request path (with query) under `proxy`.
pub fn rewrite_target(proxy: &ProxySettings, path_and_query: &str) -> Result<Uri, InvalidUri> {
    let mut path = path_and_query;
    if proxy.strip_listen_path {
        let listen_path = proxy.listen_path.trim_end_matches('/');
        path = path.strip_prefix(listen_path).unwrap_or(path);
    }
    let target = proxy.target_url.trim_end_matches('/');
    let separator = if path.starts_with('/') { "" } else { "/" };
    format!("{target}{separator}{path}").parse()
}

/// Default upstream proxy over hyper-util's pooled client.
#[derive(Clone)]
pub struct HyperProxy {
    client: Client<HttpConnector, Body>,
}

impl HyperProxy {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }
}

impl Default for HyperProxy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamProxy for HyperProxy {
    async fn forward(&self, api: &ApiDefinition, request: Request<Body>) -> Response {
        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let target = match rewrite_target(&api.proxy, path_and_query) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(
                    api_id = %api.api_id,
                    target = %api.proxy.target_url,
                    error = %e,
                    "Invalid upstream target"
                );
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid upstream target");
            }
        };

        for name in HOP_BY_HOP {
            parts.headers.remove(name);
        }
        if let Some(authority) = target.authority() {
            if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                parts.headers.insert(header::HOST, host);
            }
        }
        parts.uri = target;

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => response.map(Body::new),
            Err(e) => {
                tracing::warn!(api_id = %api.api_id, error = %e, "Upstream request failed");
                error_response(StatusCode::BAD_GATEWAY, "There was a problem proxying the request")
            }
        }
    }
}

/// Terminal stage state.
#[derive(Clone)]
pub struct UpstreamStage {
    pub api: Arc<ApiDefinition>,
    pub proxy: Arc<dyn UpstreamProxy>,
    pub health: Arc<HealthReporter>,
    pub analytics: Option<AnalyticsRecorder>,
}

pub async fn upstream_handler(
    State(stage): State<UpstreamStage>,
    request: Request<Body>,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let origin = client_origin(&request);
    let ctx = RequestContext::of(&request, &stage.api.api_id);

    let response = stage.proxy.forward(&stage.api, request).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    stage
        .health
        .record(&stage.api.api_id, HealthCounter::RequestLog(elapsed_ms));

    if let Some(analytics) = &stage.analytics {
        let record = AnalyticsRecord {
            method,
            path,
            response_code: response.status().as_u16(),
            api_id: stage.api.api_id.clone(),
            org_id: stage.api.org_id.clone(),
            api_key: ctx.token.unwrap_or_default(),
            ip_address: origin,
            request_time_ms: elapsed_ms,
            timestamp: AnalyticsRecord::now_unix(),
        };
        analytics.record(&record).await;
    }
    response
}
