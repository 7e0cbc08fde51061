//! The per-request rate limit decision.

use std::sync::Arc;
use tracing::{debug, trace};

use super::key::WindowKey;
use super::policy::RateLimitPolicy;
use super::request::RequestInfo;
use super::store::{RateLimitEntry, WindowStore};
use crate::error::RateLimitExceeded;

/// Quota metadata for a key after a request was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Requests admitted per window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Epoch seconds (rounded up) at which the window resets
    pub reset: u64,
    /// Seconds until the next admissible request; set only on rejection
    pub retry_after: Option<u64>,
}

/// Outcome of checking one request against a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The policy's skip predicate matched; nothing was counted.
    Skipped,
    /// The request fits in the window.
    Allowed(Quota),
    /// The request exceeds the window's limit.
    Limited {
        quota: Quota,
        error: RateLimitExceeded,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Limited { .. })
    }

    /// Quota metadata, if the request was counted.
    pub fn quota(&self) -> Option<&Quota> {
        match self {
            Decision::Skipped => None,
            Decision::Allowed(quota) => Some(quota),
            Decision::Limited { quota, .. } => Some(quota),
        }
    }
}

/// A fixed-window rate limiter for one policy.
///
/// Cloning is cheap; clones share the policy and the window store.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    policy: Arc<RateLimitPolicy>,
    store: Arc<WindowStore>,
}

impl RateLimiter {
    /// Create a limiter with its own store on the system clock.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_store(policy, Arc::new(WindowStore::new()))
    }

    /// Create a limiter counting into an existing store.
    ///
    /// Counters are namespaced by policy name, so limiters sharing a store
    /// must use distinct names.
    pub fn with_store(policy: RateLimitPolicy, store: Arc<WindowStore>) -> Self {
        Self {
            policy: Arc::new(policy),
            store,
        }
    }

    /// Count a request and decide whether it may proceed.
    pub fn check(&self, request: &RequestInfo) -> Decision {
        if self.policy.should_skip(request) {
            trace!(policy = %self.policy.name(), path = %request.path, "Skipping rate limit");
            return Decision::Skipped;
        }

        let key = self.window_key(request);
        let now_ms = self.store.now_ms();
        let entry = self.store.record_hit_at(&key, self.policy.window(), now_ms);
        let limit = self.policy.max_requests();

        trace!(
            key = %key,
            count = entry.count,
            limit = limit,
            "Recorded hit"
        );

        let mut quota = Quota {
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset: entry.reset_epoch_secs(),
            retry_after: None,
        };

        if entry.count <= limit {
            return Decision::Allowed(quota);
        }

        let retry_after = entry.retry_after_secs(now_ms);
        quota.retry_after = Some(retry_after);

        debug!(
            key = %key,
            count = entry.count,
            limit = limit,
            retry_after = retry_after,
            "Rate limit exceeded"
        );

        Decision::Limited {
            quota,
            error: RateLimitExceeded {
                message: self.policy.message().to_string(),
                retry_after,
                limit,
                window_ms: self.policy.window_ms(),
            },
        }
    }

    /// Current entry for the key a request maps to, without counting it.
    pub fn entry_for(&self, request: &RequestInfo) -> Option<RateLimitEntry> {
        self.store.get(&self.window_key(request))
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// The backing window store.
    pub fn store(&self) -> &Arc<WindowStore> {
        &self.store
    }

    fn window_key(&self, request: &RequestInfo) -> WindowKey {
        WindowKey::new(self.policy.name(), self.policy.key_for(request))
    }
}
