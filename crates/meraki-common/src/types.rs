use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Failure severity reported to the host, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use meraki_common::types::Severity;
///
/// let sev: Severity = "low".parse().unwrap();
/// assert_eq!(sev, Severity::Low);
/// assert_eq!(sev.to_string(), "low");
/// assert!(Severity::High > Severity::Medium);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A single scalar cell of a [`FlatRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// Flattened fields extracted from one upstream object, keyed by output name.
pub type Fields = BTreeMap<String, FieldValue>;

/// One row of a state table. Always carries a `name` field that identifies
/// the row within its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord {
    fields: Fields,
}

impl FlatRecord {
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), FieldValue::Str(name.into()));
        Self { fields }
    }

    /// Wraps extracted fields, returning `None` when `name` is missing or null.
    /// Numeric names are stored as strings.
    pub fn from_fields(mut fields: Fields) -> Option<Self> {
        let numeric = match fields.get("name")? {
            FieldValue::Str(_) => None,
            FieldValue::Int(v) => Some(v.to_string()),
            FieldValue::Float(v) => Some(v.to_string()),
            FieldValue::Null | FieldValue::Bool(_) => return None,
        };
        if let Some(name) = numeric {
            fields.insert("name".to_string(), FieldValue::Str(name));
        }
        Some(Self { fields })
    }

    pub fn name(&self) -> &str {
        self.fields
            .get("name")
            .and_then(FieldValue::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Merges fields from another fetch into this row. `name` is never overwritten.
    pub fn merge(&mut self, fields: Fields) {
        for (key, value) in fields {
            if key == "name" {
                continue;
            }
            self.fields.insert(key, value);
        }
    }
}

/// Output of one check invocation: table name to ordered rows.
///
/// # Examples
///
/// ```
/// use meraki_common::types::{FlatRecord, StateResult};
///
/// let mut state = StateResult::with_tables(&["memory", "loss"]);
/// state.push("memory", FlatRecord::new("Q2XX-0001"));
/// assert_eq!(state.table("memory").map(|t| t.len()), Some(1));
/// assert_eq!(state.table("loss").map(|t| t.len()), Some(0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateResult {
    tables: BTreeMap<String, Vec<FlatRecord>>,
}

impl StateResult {
    /// Creates a result with every listed table present and empty.
    pub fn with_tables(names: &[&str]) -> Self {
        Self {
            tables: names
                .iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
        }
    }

    pub fn push(&mut self, table: &str, record: FlatRecord) {
        self.tables.entry(table.to_string()).or_default().push(record);
    }

    pub fn extend(&mut self, table: &str, records: impl IntoIterator<Item = FlatRecord>) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(records);
    }

    pub fn table(&self, name: &str) -> Option<&[FlatRecord]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn record_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_round_trip_null_and_numbers_untagged() {
        let values: Vec<FieldValue> =
            serde_json::from_value(serde_json::json!([null, true, 3, 2.5, "x"])).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Null,
                FieldValue::Bool(true),
                FieldValue::Int(3),
                FieldValue::Float(2.5),
                FieldValue::Str("x".into()),
            ]
        );
    }

    #[test]
    fn should_reject_fields_without_name() {
        let mut fields = Fields::new();
        fields.insert("used".into(), FieldValue::Int(1));
        assert!(FlatRecord::from_fields(fields.clone()).is_none());

        fields.insert("name".into(), FieldValue::Null);
        assert!(FlatRecord::from_fields(fields.clone()).is_none());

        fields.insert("name".into(), FieldValue::Str("Q2".into()));
        let record = FlatRecord::from_fields(fields).unwrap();
        assert_eq!(record.name(), "Q2");
    }

    #[test]
    fn should_stringify_numeric_names() {
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::Int(5));
        let record = FlatRecord::from_fields(fields.clone()).unwrap();
        assert_eq!(record.get("name"), Some(&FieldValue::Str("5".into())));

        fields.insert("name".into(), FieldValue::Float(2.4));
        assert_eq!(FlatRecord::from_fields(fields).unwrap().name(), "2.4");
    }

    #[test]
    fn should_keep_name_when_merging() {
        let mut record = FlatRecord::new("Q2");
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::Str("other".into()));
        fields.insert("clientCount".into(), FieldValue::Int(7));
        record.merge(fields);

        assert_eq!(record.name(), "Q2");
        assert_eq!(record.get("clientCount"), Some(&FieldValue::Int(7)));
    }

    #[test]
    fn should_serialize_tables_in_stable_order() {
        let mut state = StateResult::with_tables(&["stats", "device"]);
        let mut record = FlatRecord::new("Q2");
        record.set("status", "online");
        record.set("lanIp", None::<String>);
        state.push("device", record);

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"device":[{"lanIp":null,"name":"Q2","status":"online"}],"stats":[]}"#
        );
    }
}
