use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Leading numeric prefix accepted by [`RawAmount::parse`].
static NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").unwrap()
});

/// An amount exactly as the extraction proxy returned it (`"12.50"` or `12.5`).
///
/// Kept verbatim so the response can echo it back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl RawAmount {
    /// Lenient float parse: the longest numeric prefix after leading whitespace.
    ///
    /// Text without a numeric prefix yields `NaN`; trailing garbage such as a
    /// currency suffix is ignored.
    pub fn parse(&self) -> f64 {
        match self {
            RawAmount::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            RawAmount::Text(s) => {
                let s = s.trim_start();
                let Some(m) = NUMERIC_PREFIX.find(s) else {
                    return f64::NAN;
                };
                let token = m.as_str();
                match token.trim_start_matches(&['+', '-'][..]) {
                    "Infinity" if token.starts_with('-') => f64::NEG_INFINITY,
                    "Infinity" => f64::INFINITY,
                    _ => token.parse().unwrap_or(f64::NAN),
                }
            }
        }
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawAmount::Number(n) => write!(f, "{n}"),
            RawAmount::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RawAmount {
    fn from(s: &str) -> Self {
        RawAmount::Text(s.to_string())
    }
}

/// One fund line read off the statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFund {
    pub name: String,
    pub amount: RawAmount,
}

impl ExtractedFund {
    pub fn new(name: impl Into<String>, amount: impl Into<RawAmount>) -> Self {
        Self {
            name: name.into(),
            amount: amount.into(),
        }
    }
}

/// Everything one extraction call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedBatch {
    /// Free-form statement date, if the proxy found one.
    #[serde(default)]
    pub date: Option<String>,
    pub funds: Vec<ExtractedFund>,
    #[serde(default)]
    pub raw_text: String,
}

/// A fund known to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntity {
    pub id: String,
    pub name: String,
}

impl LedgerEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Raw entity page as the ledger store returns it, before display-name mapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityPage {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// How extracted names are resolved against the entity directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStrategy {
    /// First entity in directory order that is equal to, contains, or is
    /// contained in the extracted name.
    #[default]
    FirstHit,
    /// Exact match anywhere wins; otherwise the longest containment hit.
    Longest,
}

/// Movement category attached to every written record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Periodic return / gain on a held position.
    Return,
}

/// Payload for a single ledger write.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerRecord {
    pub title: String,
    pub entity_id: String,
    pub amount: f64,
    pub movement: MovementKind,
    pub date: NaiveDate,
}

/// A calendar date normalized to `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalDate(pub NaiveDate);

impl CanonicalDate {
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for CanonicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for CanonicalDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What happened to one extracted fund.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    Success {
        fund_name: String,
        matched_fund_name: String,
        record_id: String,
        amount: RawAmount,
    },
    Skipped {
        fund_name: String,
        matched_fund_name: String,
        amount: RawAmount,
        reason: String,
    },
    Unmatched {
        fund_name: String,
        amount: RawAmount,
        error: String,
    },
    Error {
        fund_name: String,
        amount: RawAmount,
        error: String,
    },
}

impl ReconciliationOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Skipped { .. } => "skipped",
            Self::Unmatched { .. } => "unmatched",
            Self::Error { .. } => "error",
        }
    }

    /// Skips count as handled; only unmatched and failed writes are unsuccessful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Skipped { .. })
    }

    pub fn fund_name(&self) -> &str {
        match self {
            Self::Success { fund_name, .. }
            | Self::Skipped { fund_name, .. }
            | Self::Unmatched { fund_name, .. }
            | Self::Error { fund_name, .. } => fund_name,
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::Success { record_id, .. } => Some(record_id),
            _ => None,
        }
    }
}

impl Serialize for ReconciliationOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("success", &self.is_success())?;
        map.serialize_entry("type", self.kind())?;
        map.serialize_entry("fundName", self.fund_name())?;
        match self {
            Self::Success {
                matched_fund_name,
                record_id,
                amount,
                ..
            } => {
                map.serialize_entry("matchedFundName", matched_fund_name)?;
                map.serialize_entry("notionPageId", record_id)?;
                map.serialize_entry("amount", amount)?;
            }
            Self::Skipped {
                matched_fund_name,
                amount,
                reason,
                ..
            } => {
                map.serialize_entry("matchedFundName", matched_fund_name)?;
                map.serialize_entry("amount", amount)?;
                map.serialize_entry("reason", reason)?;
            }
            Self::Unmatched { amount, error, .. } | Self::Error { amount, error, .. } => {
                map.serialize_entry("amount", amount)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

/// Per-run counters. `total` always equals the sum of the four buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    #[serde(rename = "success")]
    pub success_count: usize,
    #[serde(rename = "failed")]
    pub failed_count: usize,
    #[serde(rename = "unmatched")]
    pub unmatched_count: usize,
    #[serde(rename = "skipped")]
    pub skipped_count: usize,
    #[serde(rename = "errors")]
    pub error_messages: Vec<String>,
}

impl ReconciliationSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn accounted(&self) -> usize {
        self.success_count + self.failed_count + self.unmatched_count + self.skipped_count
    }
}
