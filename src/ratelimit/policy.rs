//! Rate limit policies and their configurable overrides.
//!
//! A policy is the immutable description of one limiter: how long a window
//! lasts, how many requests fit in it, how a request maps to a key, which
//! requests bypass the limiter entirely, and what a rejection says.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::key;
use super::request::RequestInfo;
use crate::error::{JobgateError, Result};

/// Derives the counter key for a request.
pub type KeyFn = Arc<dyn Fn(&RequestInfo) -> String + Send + Sync>;

/// Decides whether a request bypasses the limiter.
pub type SkipFn = Arc<dyn Fn(&RequestInfo) -> bool + Send + Sync>;

/// Rejection text used when a policy does not set its own.
pub const DEFAULT_MESSAGE: &str = "Too many requests, please try again later";

/// Name given to policies built without one.
pub const DEFAULT_POLICY_NAME: &str = "default";

/// Longest window a policy may use.
pub const MAX_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Immutable configuration of one rate limiter.
#[derive(Clone)]
pub struct RateLimitPolicy {
    name: String,
    window: Duration,
    max_requests: u64,
    key_fn: KeyFn,
    skip_fn: SkipFn,
    emit_headers: bool,
    message: String,
}

impl RateLimitPolicy {
    /// Create a policy admitting `max_requests` per `window`.
    ///
    /// Both values must be non-zero and the window at most [`MAX_WINDOW`].
    pub fn new(window: Duration, max_requests: u64) -> Result<Self> {
        validate(window, max_requests).map_err(JobgateError::Config)?;
        Ok(Self::from_parts(DEFAULT_POLICY_NAME, window, max_requests, DEFAULT_MESSAGE))
    }

    /// Build a policy from values already known to be valid.
    pub(crate) fn from_parts(name: &str, window: Duration, max_requests: u64, message: &str) -> Self {
        Self {
            name: name.to_string(),
            window,
            max_requests,
            key_fn: Arc::new(key::address_and_path),
            skip_fn: Arc::new(|_: &RequestInfo| false),
            emit_headers: true,
            message: message.to_string(),
        }
    }

    /// Set the policy name. Counters are namespaced by it.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the rejection message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Enable or disable quota headers on responses.
    pub fn with_headers(mut self, emit_headers: bool) -> Self {
        self.emit_headers = emit_headers;
        self
    }

    /// Replace the key derivation.
    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&RequestInfo) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    /// Key requests by client address alone under `scope`, ignoring the path.
    pub fn with_scoped_key(self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        self.with_key_fn(move |request| key::scoped_address(&scope, request))
    }

    /// Replace the skip predicate.
    pub fn with_skip_fn<F>(mut self, skip_fn: F) -> Self
    where
        F: Fn(&RequestInfo) -> bool + Send + Sync + 'static,
    {
        self.skip_fn = Arc::new(skip_fn);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn emit_headers(&self) -> bool {
        self.emit_headers
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Derive the key for a request.
    pub fn key_for(&self, request: &RequestInfo) -> String {
        (self.key_fn)(request)
    }

    /// Whether a request bypasses this policy.
    pub fn should_skip(&self, request: &RequestInfo) -> bool {
        (self.skip_fn)(request)
    }

    /// Apply configured overrides on top of this policy.
    pub fn apply(mut self, overrides: &PolicyOverride) -> Result<Self> {
        let window = overrides
            .window_ms
            .map(Duration::from_millis)
            .unwrap_or(self.window);
        let max_requests = overrides.max_requests.unwrap_or(self.max_requests);
        validate(window, max_requests).map_err(|e| {
            JobgateError::Config(format!("policy '{}': {}", self.name, e))
        })?;

        self.window = window;
        self.max_requests = max_requests;
        if let Some(ref message) = overrides.message {
            self.message = message.clone();
        }
        if let Some(headers) = overrides.headers {
            self.emit_headers = headers;
        }
        Ok(self)
    }
}

impl std::fmt::Debug for RateLimitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitPolicy")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("emit_headers", &self.emit_headers)
            .field("message", &self.message)
            .finish()
    }
}

fn validate(window: Duration, max_requests: u64) -> std::result::Result<(), String> {
    if window.as_millis() == 0 {
        return Err("window must be at least 1ms".to_string());
    }
    if window > MAX_WINDOW {
        return Err(format!(
            "window must be at most {}ms",
            MAX_WINDOW.as_millis()
        ));
    }
    if max_requests == 0 {
        return Err("max_requests must be greater than zero".to_string());
    }
    Ok(())
}

/// Configurable overrides for a policy. Unset fields keep the policy's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    /// Window length in milliseconds
    #[serde(default)]
    pub window_ms: Option<u64>,
    /// Requests admitted per window
    #[serde(default)]
    pub max_requests: Option<u64>,
    /// Rejection message
    #[serde(default)]
    pub message: Option<String>,
    /// Whether to emit quota headers
    #[serde(default)]
    pub headers: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_policy_defaults() {
        let policy = RateLimitPolicy::new(Duration::from_secs(60), 100).unwrap();

        assert_eq!(policy.name(), DEFAULT_POLICY_NAME);
        assert_eq!(policy.window_ms(), 60_000);
        assert_eq!(policy.max_requests(), 100);
        assert!(policy.emit_headers());
        assert_eq!(policy.message(), DEFAULT_MESSAGE);

        let request = RequestInfo::new("ip1", "/jobs");
        assert_eq!(policy.key_for(&request), "ip1:/jobs");
        assert!(!policy.should_skip(&request));
    }

    #[test]
    fn test_new_policy_rejects_zero_values() {
        assert!(RateLimitPolicy::new(Duration::ZERO, 10).is_err());
        assert!(RateLimitPolicy::new(Duration::from_micros(500), 10).is_err());
        assert!(RateLimitPolicy::new(Duration::from_secs(1), 0).is_err());
    }

    #[test]
    fn test_window_is_capped() {
        assert!(RateLimitPolicy::new(MAX_WINDOW, 10).is_ok());
        assert!(RateLimitPolicy::new(MAX_WINDOW + Duration::from_millis(1), 10).is_err());

        let overrides = PolicyOverride {
            window_ms: Some(u64::MAX),
            ..Default::default()
        };
        let err = RateLimitPolicy::new(Duration::from_secs(60), 10)
            .unwrap()
            .apply(&overrides)
            .unwrap_err();
        assert!(err.to_string().contains("window must be at most"));
    }

    #[test]
    fn test_builder_methods() {
        let policy = RateLimitPolicy::new(Duration::from_secs(1), 1)
            .unwrap()
            .with_name("login")
            .with_message("slow down")
            .with_headers(false)
            .with_scoped_key("auth")
            .with_skip_fn(|r| r.path == "/health");

        assert_eq!(policy.name(), "login");
        assert_eq!(policy.message(), "slow down");
        assert!(!policy.emit_headers());
        assert_eq!(policy.key_for(&RequestInfo::new("1.2.3.4", "/x")), "auth:1.2.3.4");
        assert!(policy.should_skip(&RequestInfo::new("1.2.3.4", "/health")));
        assert!(!policy.should_skip(&RequestInfo::new("1.2.3.4", "/x")));
    }

    #[test]
    fn test_apply_overrides() {
        let policy = RateLimitPolicy::new(Duration::from_secs(60), 100).unwrap();
        let yaml = r#"
window_ms: 1000
max_requests: 3
headers: false
"#;
        let overrides: PolicyOverride = serde_yaml::from_str(yaml).unwrap();
        let policy = policy.apply(&overrides).unwrap();

        assert_eq!(policy.window_ms(), 1000);
        assert_eq!(policy.max_requests(), 3);
        assert!(!policy.emit_headers());
        assert_eq!(policy.message(), DEFAULT_MESSAGE);
    }

    #[test]
    fn test_apply_invalid_override() {
        let policy = RateLimitPolicy::new(Duration::from_secs(60), 100)
            .unwrap()
            .with_name("strict");
        let overrides = PolicyOverride {
            max_requests: Some(0),
            ..Default::default()
        };

        let err = policy.apply(&overrides).unwrap_err();
        assert!(err.to_string().contains("strict"));
    }
}
