//! Configuration management for jobgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{JobgateError, Result};
use crate::ratelimit::PresetOverrides;

/// Prefix for environment variable overrides, e.g.
/// `JOBGATE__RATE_LIMITING__TRUST_PROXY=true`.
pub const ENV_PREFIX: &str = "JOBGATE";

/// Main configuration for the jobgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Seconds between sweeps of expired windows
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Resolve client addresses from `X-Forwarded-For` / `X-Real-IP`
    #[serde(default)]
    pub trust_proxy: bool,

    /// Paths that bypass every limiter (query string ignored)
    #[serde(default = "default_skip_paths")]
    pub skip_paths: Vec<String>,

    /// Per-preset overrides
    #[serde(default)]
    pub presets: PresetOverrides,
}

impl RateLimitingConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            trust_proxy: false,
            skip_paths: default_skip_paths(),
            presets: PresetOverrides::default(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_skip_paths() -> Vec<String> {
    vec!["/health".to_string()]
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl JobgateConfig {
    /// Load configuration from an optional YAML file, then environment
    /// variables prefixed with `JOBGATE__`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path).format(::config::FileFormat::Yaml),
            );
        }

        let config: JobgateConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("rate_limiting.skip_paths")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: JobgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| JobgateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rate_limiting.sweep_interval_secs == 0 {
            return Err(JobgateError::Config(
                "rate_limiting.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JobgateConfig::default();
        assert_eq!(config.server.listen_addr.port(), 3000);
        assert_eq!(config.rate_limiting.sweep_interval(), Duration::from_secs(60));
        assert!(!config.rate_limiting.trust_proxy);
        assert_eq!(config.rate_limiting.skip_paths, vec!["/health".to_string()]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
server:
  listen_addr: "0.0.0.0:8080"
rate_limiting:
  sweep_interval_secs: 30
  trust_proxy: true
  skip_paths: ["/health", "/ready"]
  presets:
    auth:
      max_requests: 5
logging:
  json: true
"#;
        let config = JobgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.rate_limiting.sweep_interval_secs, 30);
        assert!(config.rate_limiting.trust_proxy);
        assert_eq!(config.rate_limiting.skip_paths.len(), 2);
        assert_eq!(
            config.rate_limiting.presets.auth.as_ref().unwrap().max_requests,
            Some(5)
        );
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let yaml = "rate_limiting:\n  sweep_interval_secs: 0\n";
        assert!(JobgateConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = JobgateConfig::load(None).unwrap();
        assert_eq!(config.rate_limiting.sweep_interval_secs, 60);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("jobgate-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "rate_limiting:\n  presets:\n    ai:\n      max_requests: 2\n").unwrap();

        let config = JobgateConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            config.rate_limiting.presets.ai.as_ref().unwrap().max_requests,
            Some(2)
        );
    }
}
