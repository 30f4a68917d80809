use crate::identity::Identity;
use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "lottery.toml";
const ENV_PREFIX: &str = "LOTTERY";

/// Runtime knobs for the reconciler, loaded from `lottery.toml` and `LOTTERY__*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Global admin identity; only this caller may create records.
    #[serde(default)]
    pub admin_identity: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_refresh_interval_s")]
    pub refresh_interval_s: u64,
    #[serde(default = "default_snapshot_max_age_s")]
    pub snapshot_max_age_s: u64,
    #[serde(default = "default_max_concurrent_records")]
    pub max_concurrent_records: usize,
    #[serde(default = "default_field_timeout_ms")]
    pub field_timeout_ms: u64,
}

fn default_refresh_interval_s() -> u64 {
    15
}

fn default_snapshot_max_age_s() -> u64 {
    30
}

fn default_max_concurrent_records() -> usize {
    16
}

fn default_field_timeout_ms() -> u64 {
    5_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_s: default_refresh_interval_s(),
            snapshot_max_age_s: default_snapshot_max_age_s(),
            max_concurrent_records: default_max_concurrent_records(),
            field_timeout_ms: default_field_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_s.max(1))
    }

    pub fn snapshot_max_age(&self) -> Duration {
        Duration::from_secs(self.snapshot_max_age_s)
    }

    pub fn field_timeout(&self) -> Duration {
        Duration::from_millis(self.field_timeout_ms.max(1))
    }
}

/// Backoff for ledger reads. Writes are never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: f64,
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_jitter_pct() -> f64 {
    0.2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_pct: default_jitter_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9095".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            addr: default_metrics_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_sandbox_seed")]
    pub seed: u64,
}

fn default_sandbox_seed() -> u64 {
    7
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            seed: default_sandbox_seed(),
        }
    }
}

impl AppConfig {
    /// Load from `lottery.toml` in the working directory (optional) plus the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load from an explicit file that must exist, still allowing env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(config::File::from(path).required(true))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(admin) = &self.admin_identity {
            if Identity::new(admin).is_sentinel() {
                return Err(ConfigError::Message(
                    "admin_identity must not be the zero address".to_string(),
                ));
            }
        }
        if self.engine.max_concurrent_records == 0 {
            return Err(ConfigError::Message(
                "engine.max_concurrent_records must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn admin(&self) -> Option<Identity> {
        self.admin_identity.as_deref().map(Identity::new)
    }
}
