//! Bridge configuration

use anyhow::Result;
use bridge_lib::queue::QueueConfig;
use bridge_lib::watch::ApiCompat;
use serde::Deserialize;
use std::time::Duration;

/// Bridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Scheduler name units must be addressed to
    #[serde(default = "default_scheduler_name")]
    pub scheduler_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Flow scheduler backend endpoint
    #[serde(default = "default_backend_endpoint")]
    pub backend_endpoint: String,

    /// Number of concurrent transition workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Orchestrator API major version (selects the compatibility mode)
    #[serde(default = "default_orchestrator_major")]
    pub orchestrator_major: u32,

    /// Orchestrator API minor version
    #[serde(default = "default_orchestrator_minor")]
    pub orchestrator_minor: u32,

    /// Base delay for per-key retry backoff in milliseconds
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Cap for per-key retry backoff in seconds
    #[serde(default = "default_retry_max_secs")]
    pub retry_max_secs: u64,

    /// CA certificate path for backend mTLS (plaintext when unset)
    #[serde(default)]
    pub ca_cert_path: Option<String>,

    /// Client certificate path for backend mTLS
    #[serde(default)]
    pub client_cert_path: Option<String>,

    /// Client key path for backend mTLS
    #[serde(default)]
    pub client_key_path: Option<String>,
}

fn default_scheduler_name() -> String {
    "flowsched".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_backend_endpoint() -> String {
    "http://flow-scheduler:9090".to_string()
}

fn default_workers() -> usize {
    2
}

fn default_orchestrator_major() -> u32 {
    1
}

fn default_orchestrator_minor() -> u32 {
    28
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_max_secs() -> u64 {
    60
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            scheduler_name: default_scheduler_name(),
            api_port: default_api_port(),
            backend_endpoint: default_backend_endpoint(),
            workers: default_workers(),
            orchestrator_major: default_orchestrator_major(),
            orchestrator_minor: default_orchestrator_minor(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_secs: default_retry_max_secs(),
            ca_cert_path: None,
            client_cert_path: None,
            client_key_path: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("BRIDGE"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Compatibility mode implied by the configured orchestrator version
    pub fn compat(&self) -> ApiCompat {
        ApiCompat::from_version(self.orchestrator_major, self.orchestrator_minor)
    }

    /// Retry policy for the work queue
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            base_delay: Duration::from_millis(self.retry_base_ms),
            max_delay: Duration::from_secs(self.retry_max_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.scheduler_name, "flowsched");
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.workers, 2);
        assert_eq!(config.compat(), ApiCompat::Stable);
        assert_eq!(
            config.queue_config().base_delay,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_legacy_compat_for_old_orchestrators() {
        let config = BridgeConfig {
            orchestrator_minor: 5,
            ..Default::default()
        };
        assert_eq!(config.compat(), ApiCompat::Legacy);
    }
}
