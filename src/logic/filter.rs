//! Date-Range Filter
//!
//! Inclusive `[start, end]` filtering with optional bounds. An inverted
//! range yields nothing rather than an error, so swapped user input needs no
//! special casing.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::adapter::schema::local_to_utc;
use crate::logic::record::Record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    #[cfg(test)]
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// start > end
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }

    /// Whether a record with this timestamp is kept
    pub fn contains(&self, timestamp: Option<DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        if self.is_inverted() {
            return false;
        }
        match timestamp {
            Some(t) => self.start.map_or(true, |s| s <= t) && self.end.map_or(true, |e| t <= e),
            None => false,
        }
    }
}

/// Keep records inside the range, preserving order.
pub fn filter_records(records: Vec<Record>, range: &DateRange) -> Vec<Record> {
    if range.is_unbounded() {
        return records;
    }
    if range.is_inverted() {
        log::warn!("Date range start is after end, nothing will be selected");
        return Vec::new();
    }
    records
        .into_iter()
        .filter(|r| range.contains(r.timestamp()))
        .collect()
}

// ============================================================================
// USER INPUT
// ============================================================================

/// Which end of the range a user-supplied value is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundEdge {
    Start,
    End,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid date `{input}`: use YYYY-MM-DD (e.g. 2024-01-31) or an RFC 3339 timestamp")]
pub struct BoundParseError {
    pub input: String,
}

/// Parse a CLI bound. A bare date covers the whole local day.
pub fn parse_bound(input: &str, edge: BoundEdge) -> Result<DateTime<Utc>, BoundParseError> {
    let trimmed = input.trim();
    let err = || BoundParseError { input: input.to_string() };

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| err())?;
    let naive = match edge {
        BoundEdge::Start => date.and_hms_opt(0, 0, 0),
        BoundEdge::End => date
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight - Duration::nanoseconds(1)),
    }
    .ok_or_else(err)?;

    local_to_utc(naive).ok_or_else(err)
}
