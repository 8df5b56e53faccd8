//! Request inspection helpers.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap, Request};

pub const X_REQUEST_ID: &str = "x-request-id";
const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Caller address: `X-Real-IP`, then the first `X-Forwarded-For` entry,
/// then the peer address.
pub fn client_origin<B>(request: &Request<B>) -> String {
    origin_of(request.headers(), request.extensions())
}

/// [`client_origin`] over already split request parts.
pub fn origin_of(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(real_ip) = headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }
    if let Some(forwarded) = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_origin_precedence() {
        let request = Request::builder()
            .header("x-real-ip", "10.0.0.1")
            .header("x-forwarded-for", "10.0.0.2, 10.0.0.3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_origin(&request), "10.0.0.1");

        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.2, 10.0.0.3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_origin(&request), "10.0.0.2");

        let mut request = Request::new(Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 4000))));
        assert_eq!(client_origin(&request), "192.168.1.5");
    }

    #[test]
    fn test_request_id_fallback() {
        let request = Request::new(Body::empty());
        assert_eq!(request_id(&request), "unknown");
    }
}
