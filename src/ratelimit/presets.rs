//! Named limiters for the job board's API route families.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::limiter::RateLimiter;
use super::policy::{PolicyOverride, RateLimitPolicy};
use super::reaper::Reaper;
use super::store::WindowStore;
use super::request::RequestInfo;
use crate::config::RateLimitingConfig;
use crate::error::Result;

pub const GENERAL: &str = "general";
pub const STRICT: &str = "strict";
pub const AUTH: &str = "auth";
pub const AI: &str = "ai";

const MINUTE: Duration = Duration::from_secs(60);

/// Default protection for all API traffic: 100 per minute.
pub fn general() -> RateLimitPolicy {
    RateLimitPolicy::from_parts(
        GENERAL,
        MINUTE,
        100,
        "Too many requests, please try again later",
    )
}

/// Sensitive or expensive operations: 10 per minute.
pub fn strict() -> RateLimitPolicy {
    RateLimitPolicy::from_parts(
        STRICT,
        MINUTE,
        10,
        "Too many sensitive operations, please try again later",
    )
}

/// Credential endpoints: 20 per minute per client address, across all paths.
pub fn auth() -> RateLimitPolicy {
    RateLimitPolicy::from_parts(
        AUTH,
        MINUTE,
        20,
        "Too many authentication attempts, please try again later",
    )
    .with_scoped_key(AUTH)
}

/// AI-backed generation endpoints: 5 per minute.
pub fn ai() -> RateLimitPolicy {
    RateLimitPolicy::from_parts(AI, MINUTE, 5, "Too many AI operations, please try again later")
}

/// Per-preset overrides, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetOverrides {
    #[serde(default)]
    pub general: Option<PolicyOverride>,
    #[serde(default)]
    pub strict: Option<PolicyOverride>,
    #[serde(default)]
    pub auth: Option<PolicyOverride>,
    #[serde(default)]
    pub ai: Option<PolicyOverride>,
}

/// The four preset limiters, sharing one window store.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    pub general: RateLimiter,
    pub strict: RateLimiter,
    pub auth: RateLimiter,
    pub ai: RateLimiter,
    store: Arc<WindowStore>,
}

impl RateLimiters {
    /// Presets with default settings on the system clock.
    pub fn new() -> Self {
        Self::build(Arc::new(WindowStore::new()), general(), strict(), auth(), ai())
    }

    /// Presets as configured, on the system clock.
    pub fn from_config(config: &RateLimitingConfig) -> Result<Self> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    /// Presets as configured, reading time from `clock`.
    ///
    /// Overrides replace the preset defaults field by field, and every
    /// preset skips the configured `skip_paths`.
    pub fn from_config_with_clock(config: &RateLimitingConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let overrides = &config.presets;
        let skip = &config.skip_paths;
        Ok(Self::build(
            Arc::new(WindowStore::with_clock(clock)),
            configure(general(), overrides.general.as_ref(), skip)?,
            configure(strict(), overrides.strict.as_ref(), skip)?,
            configure(auth(), overrides.auth.as_ref(), skip)?,
            configure(ai(), overrides.ai.as_ref(), skip)?,
        ))
    }

    /// Presets with defaults, reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::build(
            Arc::new(WindowStore::with_clock(clock)),
            general(),
            strict(),
            auth(),
            ai(),
        )
    }

    fn build(
        store: Arc<WindowStore>,
        general: RateLimitPolicy,
        strict: RateLimitPolicy,
        auth: RateLimitPolicy,
        ai: RateLimitPolicy,
    ) -> Self {
        Self {
            general: RateLimiter::with_store(general, store.clone()),
            strict: RateLimiter::with_store(strict, store.clone()),
            auth: RateLimiter::with_store(auth, store.clone()),
            ai: RateLimiter::with_store(ai, store.clone()),
            store,
        }
    }

    /// The shared window store.
    pub fn store(&self) -> &Arc<WindowStore> {
        &self.store
    }

    /// Start sweeping the shared store every `interval`.
    pub fn spawn_reaper(&self, interval: Duration) -> Reaper {
        Reaper::spawn(self.store.clone(), interval)
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

fn configure(
    policy: RateLimitPolicy,
    overrides: Option<&PolicyOverride>,
    skip_paths: &[String],
) -> Result<RateLimitPolicy> {
    let policy = match overrides {
        Some(o) => policy.apply(o)?,
        None => policy,
    };
    if skip_paths.is_empty() {
        return Ok(policy);
    }

    let skip_paths = skip_paths.to_vec();
    Ok(policy.with_skip_fn(move |request| is_skipped_path(&skip_paths, request)))
}

fn is_skipped_path(skip_paths: &[String], request: &RequestInfo) -> bool {
    let path = request.path.split('?').next().unwrap_or_default();
    skip_paths.iter().any(|p| p == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;

    #[test]
    fn test_preset_table() {
        let cases = [
            (general(), GENERAL, 100),
            (strict(), STRICT, 10),
            (auth(), AUTH, 20),
            (ai(), AI, 5),
        ];

        for (policy, name, max) in cases {
            assert_eq!(policy.name(), name);
            assert_eq!(policy.window_ms(), 60_000);
            assert_eq!(policy.max_requests(), max);
            assert!(policy.emit_headers());
        }
    }

    #[test]
    fn test_auth_key_ignores_path() {
        let limiters = RateLimiters::with_clock(Arc::new(ManualClock::new(0)));
        let login = RequestInfo::new("10.0.0.5", "/api/auth/login");
        let reset = RequestInfo::new("10.0.0.5", "/api/auth/reset-password");

        limiters.auth.check(&login);
        limiters.auth.check(&reset);

        assert_eq!(limiters.auth.entry_for(&login).unwrap().count, 2);
        assert_eq!(limiters.auth.policy().key_for(&login), "auth:10.0.0.5");
    }

    #[test]
    fn test_general_key_includes_path() {
        let limiters = RateLimiters::with_clock(Arc::new(ManualClock::new(0)));
        let jobs = RequestInfo::new("10.0.0.5", "/api/jobs");
        let companies = RequestInfo::new("10.0.0.5", "/api/companies");

        limiters.general.check(&jobs);
        limiters.general.check(&companies);

        assert_eq!(limiters.general.entry_for(&jobs).unwrap().count, 1);
        assert_eq!(limiters.general.entry_for(&companies).unwrap().count, 1);
    }

    #[test]
    fn test_overrides_from_yaml() {
        let yaml = r#"
strict:
  max_requests: 2
ai:
  window_ms: 1000
  message: "AI quota used up"
"#;
        let config = RateLimitingConfig {
            presets: serde_yaml::from_str(yaml).unwrap(),
            ..Default::default()
        };
        let limiters = RateLimiters::from_config(&config).unwrap();

        assert_eq!(limiters.general.policy().max_requests(), 100);
        assert_eq!(limiters.strict.policy().max_requests(), 2);
        assert_eq!(limiters.ai.policy().window_ms(), 1000);
        assert_eq!(limiters.ai.policy().max_requests(), 5);
        assert_eq!(limiters.ai.policy().message(), "AI quota used up");
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let yaml = "uploads:\n  max_requests: 3\n";
        assert!(serde_yaml::from_str::<PresetOverrides>(yaml).is_err());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let config = RateLimitingConfig {
            presets: PresetOverrides {
                general: Some(PolicyOverride {
                    window_ms: Some(0),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(RateLimiters::from_config(&config).is_err());
    }

    #[test]
    fn test_oversized_window_override_rejected() {
        let yaml = "strict:\n  window_ms: 18446744073709551615\n  max_requests: 1\n";
        let config = RateLimitingConfig {
            presets: serde_yaml::from_str(yaml).unwrap(),
            ..Default::default()
        };

        let err = RateLimiters::from_config_with_clock(&config, Arc::new(ManualClock::new(0)))
            .unwrap_err();
        assert!(err.to_string().contains("strict"));
    }

    #[test]
    fn test_configured_skip_paths() {
        let limiters = RateLimiters::from_config_with_clock(
            &RateLimitingConfig::default(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        let health = RequestInfo::new("10.0.0.5", "/health?verbose=1");
        assert!(limiters.general.policy().should_skip(&health));
        assert!(limiters.auth.policy().should_skip(&health));
        assert!(!limiters
            .general
            .policy()
            .should_skip(&RequestInfo::new("10.0.0.5", "/healthz")));
    }
}
