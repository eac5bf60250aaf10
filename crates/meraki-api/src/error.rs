use meraki_common::types::Severity;

/// Errors raised while polling the Meraki API and normalizing its responses.
///
/// # Examples
///
/// ```rust
/// use meraki_api::error::ProbeError;
/// use meraki_common::types::Severity;
///
/// let err = ProbeError::RateLimited;
/// assert!(err.to_string().contains("429"));
/// assert_eq!(err.severity(), Severity::Low);
/// assert!(!ProbeError::Config("missing serial".into()).is_retryable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Required collector configuration (`org_id`, `serial`, `secret`) is missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The endpoint answered but the requested window holds no data.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Data was returned but a required value has not materialized yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Upstream throttled the request with HTTP 429.
    #[error("(429) Too Many Requests")]
    RateLimited,

    /// Any other non-2xx response.
    #[error("Meraki API error: status={status}, reason={reason}")]
    Upstream { status: u16, reason: String },

    /// The response JSON did not have the expected shape.
    #[error("Transform error: {0}")]
    Transform(String),

    /// An underlying HTTP transport error from `reqwest`.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request limiter was closed while waiting for a permit.
    #[error("Request limiter closed")]
    LimiterClosed,
}

impl ProbeError {
    /// Severity the host should attach to a failed collection.
    pub fn severity(&self) -> Severity {
        match self {
            ProbeError::RateLimited => Severity::Low,
            ProbeError::Config(_) | ProbeError::LimiterClosed => Severity::High,
            _ => Severity::Medium,
        }
    }

    /// Whether another attempt could succeed without a configuration change.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProbeError::Config(_) | ProbeError::LimiterClosed)
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ProbeError>;
