//! HTTP error envelope and quota headers.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::error::RateLimitExceeded;
use crate::ratelimit::Quota;

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Errors surfaced to API clients.
///
/// Every variant renders as `{"error": {"type", "message", "details"?}}`.
#[derive(Debug)]
pub enum ApiError {
    /// A rate limit policy rejected the request.
    RateLimited(RateLimitExceeded),
    /// No route matched.
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::RateLimited(_) => "RateLimitError",
            ApiError::NotFound => "NotFoundError",
        }
    }
}

impl From<RateLimitExceeded> for ApiError {
    fn from(e: RateLimitExceeded) -> Self {
        ApiError::RateLimited(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        match self {
            ApiError::RateLimited(e) => {
                warn!(
                    limit = e.limit,
                    window_ms = e.window_ms,
                    retry_after = e.retry_after,
                    "Rejecting rate limited request"
                );
                let body = json!({
                    "error": {
                        "type": kind,
                        "message": e.message,
                        "details": e,
                    }
                });
                let mut response = (status, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(e.retry_after));
                response
            }
            ApiError::NotFound => {
                let body = json!({
                    "error": {
                        "type": kind,
                        "message": "Resource not found",
                    }
                });
                (status, Json(body)).into_response()
            }
        }
    }
}

/// Write quota headers, leaving any already set by an inner limiter alone.
///
/// `Retry-After` is written only for rejected requests.
pub fn apply_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    set_if_absent(headers, &X_RATELIMIT_LIMIT, quota.limit);
    set_if_absent(headers, &X_RATELIMIT_REMAINING, quota.remaining);
    set_if_absent(headers, &X_RATELIMIT_RESET, quota.reset);
    if let Some(retry_after) = quota.retry_after {
        set_if_absent(headers, &RETRY_AFTER, retry_after);
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: &HeaderName, value: u64) {
    if !headers.contains_key(name) {
        headers.insert(name.clone(), HeaderValue::from(value));
    }
}
