use serde::{Deserialize, Deserializer, Serialize};

/// Poll period the metric windows are built around.
pub const EXPECTED_INTERVAL_SECS: u64 = 300;

/// Host identity of a monitored access point. Only used for log context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub name: String,
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Per-asset collector configuration as handed over by the host.
///
/// The organization id arrives under the host key `id` and may be a JSON
/// number or string. Empty strings are treated as missing.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AssetConfig {
    #[serde(default, alias = "id", deserialize_with = "deserialize_id")]
    pub org_id: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default, rename = "_interval")]
    pub interval: Option<u64>,
}

impl AssetConfig {
    pub fn org_id(&self) -> Option<&str> {
        non_empty(self.org_id.as_deref())
    }

    pub fn serial(&self) -> Option<&str> {
        non_empty(self.serial.as_deref())
    }

    pub fn secret(&self) -> Option<&str> {
        non_empty(self.secret.as_deref())
    }

    /// Configured poll interval, falling back to the expected one.
    pub fn interval_secs(&self) -> u64 {
        self.interval.unwrap_or(EXPECTED_INTERVAL_SECS)
    }
}

impl std::fmt::Debug for AssetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetConfig")
            .field("org_id", &self.org_id)
            .field("serial", &self.serial)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("interval", &self.interval)
            .finish()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdInput {
        Text(String),
        Number(u64),
    }

    Ok(Option::<IdInput>::deserialize(deserializer)?.map(|id| match id {
        IdInput::Text(text) => text,
        IdInput::Number(number) => number.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_read_org_id_from_host_id_key() {
        let cfg: AssetConfig = serde_json::from_value(serde_json::json!({
            "id": 549236,
            "serial": "Q2XX-AAAA-0001",
            "secret": "key",
            "_interval": 60
        }))
        .expect("config should parse");

        assert_eq!(cfg.org_id(), Some("549236"));
        assert_eq!(cfg.serial(), Some("Q2XX-AAAA-0001"));
        assert_eq!(cfg.interval_secs(), 60);
    }

    #[test]
    fn should_treat_blank_values_as_missing() {
        let cfg: AssetConfig = serde_json::from_value(serde_json::json!({
            "org_id": "  ",
            "serial": ""
        }))
        .expect("config should parse");

        assert_eq!(cfg.org_id(), None);
        assert_eq!(cfg.serial(), None);
        assert_eq!(cfg.secret(), None);
        assert_eq!(cfg.interval_secs(), EXPECTED_INTERVAL_SECS);
    }

    #[test]
    fn should_redact_secret_in_debug_output() {
        let cfg = AssetConfig {
            secret: Some("very-secret".into()),
            ..Default::default()
        };
        let out = format!("{cfg:?}");
        assert!(!out.contains("very-secret"));
        assert!(out.contains("<redacted>"));
    }
}
