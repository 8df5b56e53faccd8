//! CORS stage built from an API's settings.

use std::time::Duration;

use axum::http::{HeaderName, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::apidef::CorsSettings;

const DEFAULT_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::HEAD];
const DEFAULT_HEADERS: [&str; 4] = ["origin", "accept", "content-type", "x-requested-with"];

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

/// Build the CORS layer for an API.
///
/// Wildcards become mirrored values when credentials are allowed, since a
/// literal `*` cannot be combined with credentials.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let credentials = settings.allow_credentials;

    let origin = if settings.allowed_origins.is_empty() || is_wildcard(&settings.allowed_origins) {
        if credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        AllowOrigin::list(settings.allowed_origins.iter().filter_map(|o| o.parse().ok()))
    };

    let methods = if settings.allowed_methods.is_empty() {
        AllowMethods::list(DEFAULT_METHODS)
    } else if is_wildcard(&settings.allowed_methods) {
        if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::any()
        }
    } else {
        AllowMethods::list(
            settings
                .allowed_methods
                .iter()
                .filter_map(|m| m.to_uppercase().parse::<Method>().ok()),
        )
    };

    let headers = if settings.allowed_headers.is_empty() {
        AllowHeaders::list(DEFAULT_HEADERS.iter().map(|h| HeaderName::from_static(h)))
    } else if is_wildcard(&settings.allowed_headers) {
        if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::any()
        }
    } else {
        AllowHeaders::list(
            settings
                .allowed_headers
                .iter()
                .filter_map(|h| h.parse::<HeaderName>().ok()),
        )
    };

    let mut cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(credentials);

    let exposed: Vec<HeaderName> = settings
        .exposed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();
    if !exposed.is_empty() {
        cors = cors.expose_headers(exposed);
    }
    if settings.max_age > 0 {
        cors = cors.max_age(Duration::from_secs(settings.max_age));
    }
    if settings.debug {
        tracing::debug!(?settings, "CORS layer configured");
    }
    cors
}
