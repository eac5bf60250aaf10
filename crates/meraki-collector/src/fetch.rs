use crate::metric::{
    accepts_null_fields, Conversion, FailurePolicy, Field, Metric, Presence, RetryClass, Rows,
    Select, Source,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use meraki_api::{MerakiApi, ProbeError, Result, Retry};
use meraki_common::config::AssetConfig;
use meraki_common::types::{FieldValue, Fields, FlatRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const SOFTWARE_VERSION_DETAIL: &str = "Running software version";

/// Identifiers a metric path and its fields can refer to.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub org_id: &'a str,
    pub serial: &'a str,
    pub network_id: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn new(org_id: &'a str, serial: &'a str) -> Self {
        Self {
            org_id,
            serial,
            network_id: None,
        }
    }

    pub fn with_network(self, network_id: &'a str) -> Self {
        Self {
            network_id: Some(network_id),
            ..self
        }
    }

    /// Substitutes `{org_id}`, `{network_id}` and `{serial}` in a path template.
    pub fn render(&self, template: &str) -> Result<String> {
        let mut path = template
            .replace("{org_id}", &urlencoding::encode(self.org_id))
            .replace("{serial}", &urlencoding::encode(self.serial));
        if path.contains("{network_id}") {
            let network_id = self
                .network_id
                .ok_or_else(|| ProbeError::Transform("network id is not resolved yet".into()))?;
            path = path.replace("{network_id}", &urlencoding::encode(network_id));
        }
        Ok(path)
    }
}

/// Runs [`Metric`] descriptions against the API: one retried request per
/// metric, then presence check, row selection and field conversion.
pub struct Fetcher {
    api: Arc<dyn MerakiApi>,
    light: Retry,
    critical: Retry,
    overrides: HashMap<String, FailurePolicy>,
}

impl Fetcher {
    pub fn new(api: Arc<dyn MerakiApi>, light: Retry, critical: Retry) -> Self {
        Self {
            api,
            light,
            critical,
            overrides: HashMap::new(),
        }
    }

    /// Overrides the failure policy of every metric with the given key.
    pub fn with_failure_policy(mut self, key: impl Into<String>, policy: FailurePolicy) -> Self {
        self.overrides.insert(key.into(), policy);
        self
    }

    /// Effective policy for `metric`. Overrides on metrics that cannot be
    /// nulled out are ignored.
    pub fn failure_policy(&self, metric: &Metric) -> FailurePolicy {
        if !accepts_null_fields(metric.key) {
            return metric.on_failure;
        }
        self.overrides
            .get(metric.key)
            .copied()
            .unwrap_or(metric.on_failure)
    }

    fn retry_for(&self, metric: &Metric) -> &Retry {
        match metric.retry {
            RetryClass::Light => &self.light,
            RetryClass::Critical => &self.critical,
        }
    }

    /// Fetches and normalizes all rows of `metric`.
    pub async fn rows(
        &self,
        config: &AssetConfig,
        scope: &Scope<'_>,
        metric: &Metric,
    ) -> Result<Vec<Fields>> {
        let result = self
            .retry_for(metric)
            .run(metric.key, || self.fetch_once(config, scope, metric))
            .await;

        match result {
            Ok(rows) => Ok(rows),
            Err(e) if e.is_retryable() && self.failure_policy(metric) == FailurePolicy::NullFields => {
                tracing::warn!(
                    metric = metric.key,
                    serial = scope.serial,
                    error = %e,
                    "Metric unavailable, emitting null fields"
                );
                Ok(null_rows(metric, scope))
            }
            Err(e) => Err(e),
        }
    }

    /// Fields of a single-row metric, ready to merge into another record.
    pub async fn fields(
        &self,
        config: &AssetConfig,
        scope: &Scope<'_>,
        metric: &Metric,
    ) -> Result<Fields> {
        self.rows(config, scope, metric)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProbeError::Transform(format!("{} produced no row", metric.label)))
    }

    /// Named records of `metric`, in upstream order.
    pub async fn records(
        &self,
        config: &AssetConfig,
        scope: &Scope<'_>,
        metric: &Metric,
    ) -> Result<Vec<FlatRecord>> {
        self.rows(config, scope, metric)
            .await?
            .into_iter()
            .map(|fields| {
                FlatRecord::from_fields(fields).ok_or_else(|| {
                    ProbeError::Transform(format!("{} row has no name", metric.label))
                })
            })
            .collect()
    }

    /// The single named record of `metric`.
    pub async fn record(
        &self,
        config: &AssetConfig,
        scope: &Scope<'_>,
        metric: &Metric,
    ) -> Result<FlatRecord> {
        self.records(config, scope, metric)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProbeError::Transform(format!("{} produced no row", metric.label)))
    }

    async fn fetch_once(
        &self,
        config: &AssetConfig,
        scope: &Scope<'_>,
        metric: &Metric,
    ) -> Result<Vec<Fields>> {
        let path = scope.render(metric.path)?;
        let body = self.api.get(config, &path).await?;
        normalize(metric, scope, &body)
    }
}

/// Turns one response body into rows according to `metric`.
pub fn normalize(metric: &Metric, scope: &Scope<'_>, body: &Value) -> Result<Vec<Fields>> {
    check_presence(metric, scope, body)?;

    let selected = match metric.select {
        Select::Whole => body,
        Select::First => body.get(0).ok_or_else(|| not_found(metric, scope))?,
        Select::FirstItem => body
            .get("items")
            .and_then(|items| items.get(0))
            .ok_or_else(|| not_found(metric, scope))?,
    };

    match metric.rows {
        Rows::Single => Ok(vec![extract(metric, scope, selected, None)?]),
        Rows::Each { path, required } => {
            let list: &[Value] = match lookup(selected, path) {
                Some(Value::Array(list)) => list.as_slice(),
                None | Some(Value::Null) if !required => &[],
                _ => {
                    return Err(ProbeError::Transform(format!(
                        "{} for serial `{}` has no `{}` list",
                        metric.label,
                        scope.serial,
                        path.join(".")
                    )))
                }
            };
            list.iter()
                .map(|row| extract(metric, scope, row, None))
                .collect()
        }
        Rows::Keys(keys) => keys
            .iter()
            .map(|key| {
                let row = selected.get(*key).ok_or_else(|| {
                    ProbeError::Transform(format!("{} is missing `{key}`", metric.label))
                })?;
                extract(metric, scope, row, Some(*key))
            })
            .collect(),
    }
}

fn not_found(metric: &Metric, scope: &Scope<'_>) -> ProbeError {
    ProbeError::NotFound(format!(
        "{} for serial `{}` not found",
        metric.label, scope.serial
    ))
}

fn check_presence(metric: &Metric, scope: &Scope<'_>, body: &Value) -> Result<()> {
    let present = match metric.presence {
        Presence::NonEmpty => match body {
            Value::Array(list) => !list.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Null => false,
            _ => true,
        },
        Presence::Items => body
            .get("items")
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty()),
    };
    if present {
        Ok(())
    } else {
        Err(not_found(metric, scope))
    }
}

fn lookup<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

fn resolve(field: &Field, scope: &Scope<'_>, row: &Value, key: Option<&str>) -> Option<Value> {
    match field.source {
        Source::Path(path) => lookup(row, path).cloned(),
        Source::Serial => Some(Value::from(scope.serial)),
        Source::NetworkId => Some(scope.network_id.map_or(Value::Null, Value::from)),
        Source::RowKey => key.map(Value::from),
        Source::SoftwareVersion => Some(software_version(row)),
    }
}

fn software_version(device: &Value) -> Value {
    device
        .get("details")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|detail| {
            detail.get("name").and_then(Value::as_str) == Some(SOFTWARE_VERSION_DETAIL)
        })
        .and_then(|detail| detail.get("value"))
        .cloned()
        .unwrap_or(Value::Null)
}

fn extract(metric: &Metric, scope: &Scope<'_>, row: &Value, key: Option<&str>) -> Result<Fields> {
    let mut fields = Fields::new();
    for field in metric.fields {
        let value = resolve(field, scope, row, key);
        let converted = convert(field, value.as_ref()).map_err(|e| match e {
            ProbeError::Transform(msg) => {
                ProbeError::Transform(format!("{} for serial `{}`: {msg}", metric.label, scope.serial))
            }
            ProbeError::NotReady(msg) => {
                ProbeError::NotReady(format!("{} for serial `{}`: {msg}", metric.label, scope.serial))
            }
            other => other,
        })?;
        fields.insert(field.name.to_string(), converted);
    }
    Ok(fields)
}

fn convert(field: &Field, value: Option<&Value>) -> Result<FieldValue> {
    let missing = || ProbeError::Transform(format!("missing `{}`", field.name));

    match field.conversion {
        Conversion::Raw => scalar(field, value.ok_or_else(missing)?),
        Conversion::OptionalStr => match value {
            None | Some(Value::Null) => Ok(FieldValue::Null),
            Some(Value::String(s)) if s.is_empty() => Ok(FieldValue::Null),
            Some(other) => scalar(field, other),
        },
        Conversion::Float => float(field, value.ok_or_else(missing)?),
        Conversion::FloatOrZero => match float(field, value.ok_or_else(missing)?)? {
            FieldValue::Null => Ok(FieldValue::Float(0.0)),
            other => Ok(other),
        },
        Conversion::Scaled(factor) => {
            let value = value.ok_or_else(missing)?;
            if let Some(n) = value.as_i64() {
                return n
                    .checked_mul(factor)
                    .map(FieldValue::Int)
                    .ok_or_else(|| ProbeError::Transform(format!("`{}` overflows", field.name)));
            }
            match value {
                Value::Number(n) => Ok(FieldValue::Float(
                    n.as_f64().unwrap_or_default() * factor as f64,
                )),
                Value::Null => Err(ProbeError::NotReady(format!(
                    "`{}` has no value yet",
                    field.name
                ))),
                _ => Err(ProbeError::Transform(format!(
                    "`{}` is not a number",
                    field.name
                ))),
            }
        }
        Conversion::Timestamp => Ok(value
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .map_or(FieldValue::Null, FieldValue::Int)),
    }
}

fn scalar(field: &Field, value: &Value) -> Result<FieldValue> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Bool(b) => Ok(FieldValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(FieldValue::Int(i)),
            None => Ok(FieldValue::Float(n.as_f64().unwrap_or_default())),
        },
        Value::String(s) => Ok(FieldValue::Str(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(ProbeError::Transform(format!(
            "`{}` is not a scalar",
            field.name
        ))),
    }
}

fn float(field: &Field, value: &Value) -> Result<FieldValue> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Number(n) => Ok(FieldValue::Float(n.as_f64().unwrap_or_default())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|_| ProbeError::Transform(format!("`{}` is not numeric: {s}", field.name))),
        _ => Err(ProbeError::Transform(format!(
            "`{}` is not numeric",
            field.name
        ))),
    }
}

/// Parses an ISO-8601 timestamp into epoch seconds. Values without an offset
/// are read as UTC, bare dates as UTC midnight.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.and_utc().timestamp())
}

/// Rows emitted for a metric whose fetch failed under [`FailurePolicy::NullFields`].
fn null_rows(metric: &Metric, scope: &Scope<'_>) -> Vec<Fields> {
    let null_row = |key: Option<&str>| {
        metric
            .fields
            .iter()
            .map(|field| {
                let value = match field.source {
                    Source::Path(_) | Source::SoftwareVersion => FieldValue::Null,
                    _ => resolve(field, scope, &Value::Null, key)
                        .and_then(|v| scalar(field, &v).ok())
                        .unwrap_or(FieldValue::Null),
                };
                (field.name.to_string(), value)
            })
            .collect::<Fields>()
    };

    match metric.rows {
        Rows::Single => vec![null_row(None)],
        Rows::Each { .. } => Vec::new(),
        Rows::Keys(keys) => keys.iter().map(|key| null_row(Some(*key))).collect(),
    }
}
