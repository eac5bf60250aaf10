use anyhow::bail;
use meraki_api::client::MAX_REQUESTS_ENV;
use meraki_api::{RequestLimiter, RetryPolicy};
use meraki_collector::metric::{self, FailurePolicy};
use meraki_collector::CheckRegistry;
use meraki_common::config::{Asset, AssetConfig, EXPECTED_INTERVAL_SECS};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ProbeConfig {
    /// API root, only overridden for local testing.
    pub api_url: Option<String>,
    /// Upper bound on concurrent API requests. `MAX_REQUESTS` wins when set.
    pub max_requests: Option<usize>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    /// Per-metric failure policy overrides, keyed by metric key.
    #[serde(default)]
    pub failure_policy: BTreeMap<String, FailurePolicy>,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_light_delay")]
    pub light_delay_ms: u64,
    #[serde(default = "default_critical_delay")]
    pub critical_delay_ms: u64,
    #[serde(default = "default_critical_jitter")]
    pub critical_jitter_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct AssetEntry {
    pub id: u64,
    pub name: String,
    pub checks: Vec<String>,
    #[serde(default)]
    pub config: AssetConfig,
}

fn default_poll_interval() -> u64 {
    EXPECTED_INTERVAL_SECS
}

fn default_attempts() -> u32 {
    2
}

fn default_light_delay() -> u64 {
    1000
}

fn default_critical_delay() -> u64 {
    2000
}

fn default_critical_jitter() -> u64 {
    3000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            light_delay_ms: default_light_delay(),
            critical_delay_ms: default_critical_delay(),
            critical_jitter_ms: default_critical_jitter(),
        }
    }
}

impl RetrySettings {
    pub fn light(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.attempts, Duration::from_millis(self.light_delay_ms))
    }

    pub fn critical(&self) -> RetryPolicy {
        RetryPolicy::jittered(
            self.attempts,
            Duration::from_millis(self.critical_delay_ms),
            Duration::from_millis(self.critical_jitter_ms),
        )
    }
}

impl AssetEntry {
    pub fn asset(&self) -> Asset {
        Asset {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

impl ProbeConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.retry.attempts == 0 {
            bail!("retry.attempts must be at least 1");
        }
        for (key, policy) in &self.failure_policy {
            if !metric::is_known_key(key) {
                bail!("failure_policy: unknown metric `{key}`");
            }
            if *policy == FailurePolicy::NullFields && !metric::accepts_null_fields(key) {
                bail!("failure_policy: `{key}` must propagate failures");
            }
        }

        let registry = CheckRegistry::new();
        for entry in &self.assets {
            if entry.checks.is_empty() {
                bail!("asset `{}` has no checks", entry.name);
            }
            for check in &entry.checks {
                if registry.get(check).is_none() {
                    bail!("asset `{}`: unknown check `{check}`", entry.name);
                }
            }
        }
        Ok(())
    }

    /// Limiter shared by every request the process makes.
    pub fn request_limiter(&self) -> RequestLimiter {
        if std::env::var_os(MAX_REQUESTS_ENV).is_some() {
            return RequestLimiter::from_env();
        }
        self.max_requests.map(RequestLimiter::new).unwrap_or_default()
    }
}
