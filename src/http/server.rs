//! HTTP server hosting the job board API behind the preset limiters.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{error, info};

use super::layer::RateLimitLayer;
use super::response::ApiError;
use crate::error::{JobgateError, Result};
use crate::ratelimit::{RateLimiter, RateLimiters};

/// Build the API router with each route family behind its preset.
///
/// `/api/recommendations` is guarded by `general` and then `strict`; the
/// outer layer of a [`ServiceBuilder`] runs first.
pub fn router(limiters: &RateLimiters, trust_proxy: bool) -> Router {
    let layer = |limiter: &RateLimiter| {
        RateLimitLayer::new(limiter.clone()).trust_proxy(trust_proxy)
    };

    Router::new()
        .route("/health", get(health).layer(layer(&limiters.general)))
        .route("/api/jobs", get(list_jobs).layer(layer(&limiters.general)))
        .route(
            "/api/recommendations",
            get(recommendations).layer(
                ServiceBuilder::new()
                    .layer(layer(&limiters.general))
                    .layer(layer(&limiters.strict)),
            ),
        )
        .route("/api/auth/login", post(login).layer(layer(&limiters.auth)))
        .route("/api/ai/generate", post(generate).layer(layer(&limiters.ai)))
        .fallback(not_found)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn list_jobs() -> Json<Value> {
    Json(json!({ "jobs": [] }))
}

async fn recommendations() -> Json<Value> {
    Json(json!({ "recommendations": [] }))
}

async fn login() -> Json<Value> {
    Json(json!({ "authenticated": false }))
}

async fn generate() -> Json<Value> {
    Json(json!({ "content": "" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// HTTP server for the job board API.
pub struct ApiServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Application router
    router: Router,
}

impl ApiServer {
    /// Create a new server serving `router`.
    pub fn new(addr: SocketAddr, router: Router) -> Self {
        Self { addr, router }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server stops accepting connections when `signal` resolves and
    /// returns once in-flight requests finish.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            JobgateError::Server(e.to_string())
        })
    }
}
