//! Per-category coercion schemas.
//!
//! Each category declares its canonical field set once. Coercion walks the
//! declared fields only; every lookup is a presence check and unknown raw
//! fields are ignored.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::Value;

use crate::logic::collector::RawRecord;
use crate::logic::record::{Attributes, Category, Record, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
    Float,
}

impl FieldKind {
    fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Int => "integer",
            FieldKind::Float => "number",
        }
    }
}

/// One canonical attribute and the raw names it may arrive under
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<&'static str>,
}

#[derive(Debug)]
pub struct Schema {
    pub category: Category,
    pub default_type: &'static str,
    pub timestamp_keys: &'static [&'static str],
    pub fields: &'static [FieldSpec],
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRecord {
    #[error("missing required field `{0}`")]
    Missing(&'static str),

    #[error("field `{field}` is not a valid {kind}")]
    Invalid {
        field: &'static str,
        kind: &'static str,
    },
}

const fn optional(name: &'static str, aliases: &'static [&'static str], kind: FieldKind) -> FieldSpec {
    FieldSpec { name, aliases, kind, required: false, default: None }
}

const fn required(name: &'static str, aliases: &'static [&'static str]) -> FieldSpec {
    FieldSpec { name, aliases, kind: FieldKind::Text, required: true, default: None }
}

// ============================================================================
// SCHEMAS
// ============================================================================

static LOGIN: Schema = Schema {
    category: Category::Login,
    default_type: "session",
    timestamp_keys: &["timestamp", "started", "login_time", "start_time"],
    fields: &[
        required("username", &["username", "user", "name"]),
        FieldSpec {
            name: "host",
            aliases: &["host", "hostname"],
            kind: FieldKind::Text,
            required: false,
            default: Some("localhost"),
        },
        optional("process_count", &["process_count"], FieldKind::Int),
    ],
};

static FILE_SHARE: Schema = Schema {
    category: Category::FileShare,
    default_type: "recent_file",
    timestamp_keys: &["timestamp", "mtime", "last_accessed", "modified"],
    fields: &[
        required("path", &["path", "file", "drive", "name"]),
        optional("file_system", &["file_system", "fs_type"], FieldKind::Text),
        optional("size_bytes", &["size_bytes", "size"], FieldKind::Int),
    ],
};

static APP_USAGE: Schema = Schema {
    category: Category::AppUsage,
    default_type: "running_process",
    timestamp_keys: &["start_time", "timestamp", "install_date", "InstallDate"],
    fields: &[
        required("name", &["name", "display_name", "DisplayName"]),
        optional("path", &["path", "exe"], FieldKind::Text),
        optional("pid", &["pid"], FieldKind::Int),
        optional("cpu_percent", &["cpu_percent", "cpu"], FieldKind::Float),
        optional("memory_percent", &["memory_percent", "mem_percent"], FieldKind::Float),
        optional("publisher", &["publisher", "Publisher"], FieldKind::Text),
        optional("version", &["version", "DisplayVersion"], FieldKind::Text),
    ],
};

pub fn for_category(category: Category) -> &'static Schema {
    match category {
        Category::Login => &LOGIN,
        Category::FileShare => &FILE_SHARE,
        Category::AppUsage => &APP_USAGE,
    }
}

// ============================================================================
// COERCION
// ============================================================================

impl Schema {
    /// Total coercion of one raw record
    pub fn coerce(&self, raw: &RawRecord) -> Result<Record, MalformedRecord> {
        let mut attributes = Attributes::new();

        for field in self.fields {
            let value = lookup(raw, field.aliases).and_then(|v| coerce_value(v, field.kind));
            match value {
                Some(scalar) => {
                    attributes.insert(field.name.to_string(), scalar);
                }
                None if field.required => {
                    return Err(match lookup(raw, field.aliases) {
                        None => MalformedRecord::Missing(field.name),
                        Some(_) => MalformedRecord::Invalid {
                            field: field.name,
                            kind: field.kind.as_str(),
                        },
                    });
                }
                None => {
                    if let Some(default) = field.default {
                        attributes.insert(field.name.to_string(), Scalar::from(default));
                    }
                }
            }
        }

        let kind = lookup_text(raw, &["type", "kind"]).unwrap_or(self.default_type);
        let source = lookup_text(raw, &["source"]).unwrap_or("unknown");
        let timestamp = lookup(raw, self.timestamp_keys).and_then(coerce_timestamp);

        Ok(Record::new(self.category, kind, source, timestamp, attributes))
    }
}

/// First alias present with a non-null value
fn lookup<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn lookup_text<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a str> {
    lookup(raw, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn coerce_value(value: &Value, kind: FieldKind) -> Option<Scalar> {
    match kind {
        FieldKind::Text => match value {
            Value::String(s) if !s.trim().is_empty() => Some(Scalar::Text(s.trim().to_string())),
            Value::Number(n) => Some(Scalar::Text(n.to_string())),
            Value::Bool(b) => Some(Scalar::Text(b.to_string())),
            _ => None,
        },
        FieldKind::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .map(Scalar::Int),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Scalar::Int),
            _ => None,
        },
        FieldKind::Float => match value {
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(Scalar::Float),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Scalar::Float),
            _ => None,
        },
    }
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Coerce a raw timestamp; anything unusable is treated as absent.
pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch_secs),
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_utc(naive);
        }
    }

    // Registry InstallDate style (YYYYMMDD) before trying epoch seconds
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(s, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(local_to_utc);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).and_then(local_to_utc);
    }

    s.parse::<f64>().ok().and_then(from_epoch_secs)
}

fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Longest clock jump stepped over when a wall-clock time does not exist
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Resolve a wall-clock value recorded on this machine.
///
/// Repeated times take the earlier instant. Times skipped by a DST jump
/// resolve to the first instant after the gap.
pub fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    resolve_wall_clock(naive, |n| {
        Local.from_local_datetime(n).map(|dt| dt.with_timezone(&Utc))
    })
}

pub(crate) fn resolve_wall_clock(
    naive: NaiveDateTime,
    lookup: impl Fn(&NaiveDateTime) -> LocalResult<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if let Some(dt) = lookup(&naive).earliest() {
        return Some(dt);
    }
    // Gaps start and end on whole minutes
    let minute = naive.with_second(0)?.with_nanosecond(0)?;
    (1..=MAX_GAP_MINUTES).find_map(|m| {
        let candidate = minute.checked_add_signed(Duration::minutes(m))?;
        lookup(&candidate).earliest()
    })
}
