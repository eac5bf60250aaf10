//! Bounded, retrying access to the Meraki dashboard API.
//!
//! [`client::MerakiClient`] issues authenticated GET requests through a shared
//! [`client::RequestLimiter`], and [`retry::Retry`] wraps any call in a
//! bounded retry policy.

pub mod client;
pub mod error;
pub mod retry;

use meraki_common::config::AssetConfig;

pub use client::{MerakiClient, RequestLimiter};
pub use error::{ProbeError, Result};
pub use retry::{Backoff, Delay, Retry, RetryPolicy, TokioDelay};

/// Read access to the Meraki API, abstracted so collectors can run against
/// canned responses.
#[async_trait::async_trait]
pub trait MerakiApi: Send + Sync {
    /// GETs `path` (relative to the API root, query string already encoded)
    /// using the credential from `config` and returns the parsed JSON body.
    async fn get(&self, config: &AssetConfig, path: &str) -> Result<serde_json::Value>;
}
