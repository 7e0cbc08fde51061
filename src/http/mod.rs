//! HTTP integration: the rate limit middleware, the error envelope it
//! rejects with, and the API server hosting it.

mod layer;
mod response;
mod server;

pub use layer::{RateLimitLayer, RateLimitService};
pub use response::{
    apply_quota_headers, ApiError, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use server::{router, ApiServer};

use std::time::Duration;

use crate::ratelimit::{RateLimitPolicy, RateLimiter, Reaper};

/// Build the middleware for `policy` together with the reaper that keeps
/// its window store bounded.
///
/// Must be called from within a Tokio runtime. Dropping or shutting down
/// the returned [`Reaper`] stops the sweep; the layer keeps working
/// either way since expired windows are also reset on access.
pub fn rate_limit(policy: RateLimitPolicy, sweep_interval: Duration) -> (RateLimitLayer, Reaper) {
    let limiter = RateLimiter::new(policy);
    let reaper = Reaper::spawn(limiter.store().clone(), sweep_interval);
    (RateLimitLayer::new(limiter), reaper)
}
