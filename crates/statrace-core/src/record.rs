use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single extracted field: either numeric or textual.
///
/// Upstream tables mix the two freely (a minutes column next to a
/// nationality code), so records carry the tag instead of forcing a type
/// per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => Some(s.as_str()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// One extracted table row: field name → value. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixtures.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Numeric value of a field; `None` for missing or textual fields.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_number)
    }

    /// Textual value of a field; `None` for missing or numeric fields.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Weighted sum over the configured fields. Missing and textual fields
    /// contribute zero; weights may be negative.
    pub fn weighted_value(&self, fields: &BTreeMap<String, f64>) -> f64 {
        fields
            .iter()
            .map(|(name, weight)| self.number(name).unwrap_or(0.0) * weight)
            .sum()
    }
}

/// All records for one period from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBatch {
    /// Source label (e.g. a league name), used for logging and filenames.
    pub source: String,
    pub period: u32,
    pub records: Vec<RawRecord>,
}

impl PeriodBatch {
    pub fn new(source: impl Into<String>, period: u32) -> Self {
        Self {
            source: source.into(),
            period,
            records: Vec::new(),
        }
    }
}

/// One row of a season schedule page: which round, when, and where the
/// stats page lives. `url` is `None` for rounds not yet played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRef {
    pub round: u32,
    pub date: String,
    pub url: Option<String>,
}

/// One ranked entry of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub name: String,
    pub value: f64,
    pub position: Option<String>,
    /// Accumulated exposure; present in per-exposure mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,
    /// Raw cumulative value; present in per-exposure mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative: Option<f64>,
}

/// Ranked leaderboard snapshot as of one period. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub period: String,
    pub data: Vec<FrameEntry>,
}
