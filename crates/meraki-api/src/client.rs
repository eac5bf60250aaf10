use crate::error::{ProbeError, Result};
use crate::MerakiApi;
use meraki_common::config::AssetConfig;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit};

pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";
pub const API_KEY_HEADER: &str = "X-Cisco-Meraki-API-Key";
pub const DEFAULT_MAX_REQUESTS: usize = 5;
pub const MAX_REQUESTS_ENV: &str = "MAX_REQUESTS";

/// Counting permit pool shared by every client that talks to the same API.
///
/// Cloning the limiter shares the pool, so one instance per process keeps the
/// total number of in-flight requests bounded no matter how many assets and
/// checks run at the same time.
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl RequestLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Builds a limiter sized from the `MAX_REQUESTS` environment variable.
    pub fn from_env() -> Self {
        let raw = std::env::var(MAX_REQUESTS_ENV).ok();
        Self::new(parse_max_requests(raw.as_deref()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a permit. The permit is returned to the pool when dropped.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| ProbeError::LimiterClosed)
    }

    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for RequestLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS)
    }
}

fn parse_max_requests(raw: Option<&str>) -> usize {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_MAX_REQUESTS,
        Some(value) => match value.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                tracing::warn!(
                    value,
                    default = DEFAULT_MAX_REQUESTS,
                    "Invalid {MAX_REQUESTS_ENV}, using default"
                );
                DEFAULT_MAX_REQUESTS
            }
        },
    }
}

/// Authenticated GET client for the Meraki dashboard API.
pub struct MerakiClient {
    client: Client,
    base_url: String,
    limiter: RequestLimiter,
}

impl MerakiClient {
    pub fn new(limiter: RequestLimiter) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            limiter,
        })
    }

    /// Points the client at another API root, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl MerakiApi for MerakiClient {
    async fn get(&self, config: &AssetConfig, path: &str) -> Result<serde_json::Value> {
        let api_key = config.secret().ok_or_else(|| {
            ProbeError::Config(
                "API key is missing, please provide the API key as `secret` in the asset config"
                    .to_string(),
            )
        })?;
        let url = format!("{}{}", self.base_url, path);

        let _permit = self.limiter.acquire().await?;
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Meraki API response"
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProbeError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProbeError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
