//! The view of an inbound request that key and skip functions see.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request};

/// Address used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Request metadata consumed by key derivation and skip predicates.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Resolved client address (IP only, no port)
    pub client_addr: String,
    /// Request path including the query string, as the client sent it
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Request headers
    pub headers: HeaderMap,
}

impl RequestInfo {
    /// Build a request view by hand. Mostly useful in tests.
    pub fn new(client_addr: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            client_addr: client_addr.into(),
            path: path.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }

    /// Set the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Extract the request view from an HTTP request.
    ///
    /// When `trust_proxy` is set the first `X-Forwarded-For` hop, then
    /// `X-Real-IP`, take precedence over the socket address.
    pub fn from_request<B>(request: &Request<B>, trust_proxy: bool) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);

        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        Self {
            client_addr: resolve_client_addr(remote_addr, request.headers(), trust_proxy),
            path,
            method: request.method().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// Determine the client address for rate limiting.
pub fn resolve_client_addr(
    remote_addr: Option<SocketAddr>,
    headers: &HeaderMap,
    trust_proxy: bool,
) -> String {
    if trust_proxy {
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return ip.to_string();
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return ip.to_string();
        }
    }

    remote_addr
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
