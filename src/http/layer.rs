//! Tower middleware that gates requests through a [`RateLimiter`].

use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::response::{apply_quota_headers, ApiError};
use crate::ratelimit::{Decision, RateLimiter, RequestInfo};

/// Layer that applies one rate limit policy to the wrapped service.
///
/// Layers compose: when several are stacked on a route, the outermost
/// runs first and a rejection there means inner limiters never see the
/// request.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
    trust_proxy: bool,
}

impl RateLimitLayer {
    /// Create a layer around `limiter`.
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter,
            trust_proxy: false,
        }
    }

    /// Resolve client addresses from proxy headers.
    pub fn trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            trust_proxy: self.trust_proxy,
        }
    }
}

/// Service produced by [`RateLimitLayer`].
#[derive(Debug, Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimiter,
    trust_proxy: bool,
}

impl<S> Service<Request> for RateLimitService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The decision is made synchronously, before the request is handed on.
        let info = RequestInfo::from_request(&request, self.trust_proxy);
        let decision = self.limiter.check(&info);
        let emit_headers = self.limiter.policy().emit_headers();

        // Call the instance that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match decision {
                Decision::Skipped => inner.call(request).await,
                Decision::Allowed(quota) => {
                    let mut response = inner.call(request).await?;
                    if emit_headers {
                        apply_quota_headers(response.headers_mut(), &quota);
                    }
                    Ok(response)
                }
                Decision::Limited { quota, error } => {
                    let mut response = ApiError::from(error).into_response();
                    if emit_headers {
                        apply_quota_headers(response.headers_mut(), &quota);
                    }
                    Ok(response)
                }
            }
        })
    }
}
