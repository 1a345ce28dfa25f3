//! Record Model - Canonical Activity Record
//!
//! Every collector, whatever its platform, ends up producing `Record`s.
//! Records are immutable once built: fields are private and read through accessors.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CATEGORY
// ============================================================================

/// Data source partition of a record.
///
/// Declaration order is the tie-break order used by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Login,
    FileShare,
    AppUsage,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Login, Category::FileShare, Category::AppUsage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Login => "login",
            Category::FileShare => "file_share",
            Category::AppUsage => "app_usage",
        }
    }

    /// Human readable label used in reports and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            Category::Login => "Login Events",
            Category::FileShare => "File Shares",
            Category::AppUsage => "Applications",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SCALAR ATTRIBUTES
// ============================================================================

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{:.1}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Ordered attribute map; ordering keeps serialization deterministic.
pub type Attributes = BTreeMap<String, Scalar>;

// ============================================================================
// RECORD
// ============================================================================

/// One normalized activity observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    timestamp: Option<DateTime<Utc>>,
    category: Category,
    #[serde(rename = "type")]
    kind: String,
    source: String,
    attributes: Attributes,
}

impl Record {
    pub fn new(
        category: Category,
        kind: impl Into<String>,
        source: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
        attributes: Attributes,
    ) -> Self {
        Self {
            timestamp,
            category,
            kind: kind.into(),
            source: source.into(),
            attributes,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Collector-defined sub-kind (`session`, `recent_file`, `running_process`, ...)
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attr(&self, key: &str) -> Option<&Scalar> {
        self.attributes().get(key)
    }

    /// Text attribute or empty string
    pub fn attr_text(&self, key: &str) -> &str {
        self.attr(key).and_then(Scalar::as_text).unwrap_or("")
    }

    /// Key identifying exact duplicates (category, type, source, timestamp, attributes).
    pub fn identity_key(&self) -> String {
        // BTreeMap attributes serialize in a stable order
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Record {
        let mut attrs = Attributes::new();
        attrs.insert("username".into(), "alice".into());
        attrs.insert("host".into(), "localhost".into());
        Record::new(
            Category::Login,
            "session",
            "process_table",
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()),
            attrs,
        )
    }

    #[test]
    fn test_category_order_is_tie_break_order() {
        assert!(Category::Login < Category::FileShare);
        assert!(Category::FileShare < Category::AppUsage);
    }

    #[test]
    fn test_serialized_shape_mirrors_record() {
        let value = serde_json::to_value(sample()).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 5);
        assert_eq!(obj["category"], "login");
        assert_eq!(obj["type"], "session");
        assert_eq!(obj["source"], "process_table");
        assert_eq!(obj["attributes"]["username"], "alice");
        assert!(obj["timestamp"].as_str().unwrap().starts_with("2024-01-15T09:00:00"));
    }

    #[test]
    fn test_deserialize_back() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_identity_key_ignores_attribute_insertion_order() {
        let mut attrs = Attributes::new();
        attrs.insert("host".into(), "localhost".into());
        attrs.insert("username".into(), "alice".into());
        let other = Record::new(
            Category::Login,
            "session",
            "process_table",
            sample().timestamp(),
            attrs,
        );
        assert_eq!(other.identity_key(), sample().identity_key());
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Float(12.345).to_string(), "12.3");
        assert_eq!(Scalar::Int(42).to_string(), "42");
        assert_eq!(Scalar::from("x").to_string(), "x");
    }
}
