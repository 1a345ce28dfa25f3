//! Aggregator - Merge, Order & Summarize
//!
//! Merges the per-category sequences into one timeline. Ordering is total:
//! timestamp, then category (login < file_share < app_usage), then discovery
//! order. Untimestamped records trail, by category then discovery order.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::record::{Category, Record};

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub login: usize,
    pub file_share: usize,
    pub app_usage: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Login => self.login,
            Category::FileShare => self.file_share,
            Category::AppUsage => self.app_usage,
        }
    }

    fn bump(&mut self, category: Category) {
        match category {
            Category::Login => self.login += 1,
            Category::FileShare => self.file_share += 1,
            Category::AppUsage => self.app_usage += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub per_category: CategoryCounts,
    /// Counts keyed by record type (`session`, `recent_file`, ...)
    pub per_type: BTreeMap<String, usize>,
    /// Distinct origin mechanisms per category
    pub sources: BTreeMap<Category, BTreeSet<String>>,
    pub untimestamped: usize,
    pub time_span: Option<TimeSpan>,
}

/// Ordered records plus their summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub records: Vec<Record>,
    pub summary: Summary,
}

// ============================================================================
// DEDUPLICATION
// ============================================================================

/// Collapse exact duplicates, keeping the first occurrence.
///
/// Returns the surviving records and how many were collapsed.
pub fn dedup_exact(records: Vec<Record>) -> (Vec<Record>, usize) {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<Record> = records
        .into_iter()
        .filter(|r| seen.insert(r.identity_key()))
        .collect();
    let collapsed = before - kept.len();
    (kept, collapsed)
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Merge the three per-category sequences into one ordered, summarized set.
pub fn aggregate(logins: Vec<Record>, file_shares: Vec<Record>, app_usage: Vec<Record>) -> Aggregate {
    let mut timed: Vec<(DateTime<Utc>, Category, usize, usize, Record)> = Vec::new();
    let mut untimed: Vec<(Category, usize, usize, Record)> = Vec::new();

    for (slot, batch) in [logins, file_shares, app_usage].into_iter().enumerate() {
        // Same rule the adapters apply; inputs built elsewhere get it too
        let (batch, collapsed) = dedup_exact(batch);
        if collapsed > 0 {
            log::debug!("Aggregator collapsed {} duplicate(s) in input {}", collapsed, slot);
        }

        for (index, record) in batch.into_iter().enumerate() {
            match record.timestamp() {
                Some(ts) => timed.push((ts, record.category(), slot, index, record)),
                None => untimed.push((record.category(), slot, index, record)),
            }
        }
    }

    timed.sort_by(|a, b| (a.0, a.1, a.2, a.3).cmp(&(b.0, b.1, b.2, b.3)));
    untimed.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

    let records: Vec<Record> = timed
        .into_iter()
        .map(|(.., record)| record)
        .chain(untimed.into_iter().map(|(.., record)| record))
        .collect();

    let summary = summarize(&records);
    Aggregate { records, summary }
}

/// Summary counts over an already ordered sequence
pub fn summarize(records: &[Record]) -> Summary {
    let mut summary = Summary {
        total: records.len(),
        ..Default::default()
    };
    let mut earliest: Option<DateTime<Utc>> = None;
    let mut latest: Option<DateTime<Utc>> = None;

    for record in records {
        summary.per_category.bump(record.category());
        *summary.per_type.entry(record.kind().to_string()).or_insert(0) += 1;
        summary
            .sources
            .entry(record.category())
            .or_default()
            .insert(record.source().to_string());

        match record.timestamp() {
            Some(ts) => {
                earliest = Some(earliest.map_or(ts, |e| e.min(ts)));
                latest = Some(latest.map_or(ts, |l| l.max(ts)));
            }
            None => summary.untimestamped += 1,
        }
    }

    summary.time_span = earliest.zip(latest).map(|(earliest, latest)| TimeSpan { earliest, latest });
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::filter::{filter_records, DateRange};
    use crate::logic::record::Attributes;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    fn rec(category: Category, kind: &str, ts: Option<DateTime<Utc>>, key: &str) -> Record {
        let mut attrs = Attributes::new();
        attrs.insert("key".into(), key.into());
        Record::new(category, kind, "test", ts, attrs)
    }

    fn keys(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.attr_text("key").to_string()).collect()
    }

    #[test]
    fn test_filter_then_aggregate_example() {
        let range = DateRange::new(Some(at(9, 0)), Some(at(9, 4)));
        let logins = vec![
            rec(Category::Login, "session", Some(at(9, 0)), "login-0900"),
            rec(Category::Login, "session", Some(at(9, 5)), "login-0905"),
        ];
        let files = vec![rec(Category::FileShare, "recent_file", Some(at(9, 3)), "file-0903")];
        let apps = vec![rec(Category::AppUsage, "running_process", Some(at(9, 3)), "app-0903")];

        let result = aggregate(
            filter_records(logins, &range),
            filter_records(files, &range),
            filter_records(apps, &range),
        );

        assert_eq!(keys(&result.records), vec!["login-0900", "file-0903", "app-0903"]);
        assert_eq!(result.summary.total, 3);
        let span = result.summary.time_span.unwrap();
        assert_eq!(span.earliest, at(9, 0));
        assert_eq!(span.latest, at(9, 3));
    }

    #[test]
    fn test_counts_without_filter() {
        let logins: Vec<Record> = (0..2)
            .map(|i| rec(Category::Login, "session", Some(at(8, i)), &format!("l{}", i)))
            .collect();
        let files: Vec<Record> = (0..159)
            .map(|i| rec(Category::FileShare, "recent_file", Some(at(10, 0)), &format!("f{}", i)))
            .collect();
        let apps: Vec<Record> = (0..324)
            .map(|i| rec(Category::AppUsage, "running_process", None, &format!("a{}", i)))
            .collect();

        let result = aggregate(
            filter_records(logins, &DateRange::unbounded()),
            filter_records(files, &DateRange::unbounded()),
            filter_records(apps, &DateRange::unbounded()),
        );

        assert_eq!(result.summary.total, 485);
        assert_eq!(result.summary.per_category.login, 2);
        assert_eq!(result.summary.per_category.file_share, 159);
        assert_eq!(result.summary.per_category.app_usage, 324);
        assert_eq!(result.summary.untimestamped, 324);
        assert_eq!(result.summary.per_type["recent_file"], 159);
    }

    #[test]
    fn test_sorted_with_untimestamped_trailing_in_order() {
        let logins = vec![
            rec(Category::Login, "session", None, "l-none-1"),
            rec(Category::Login, "session", Some(at(12, 0)), "l-12"),
            rec(Category::Login, "session", None, "l-none-2"),
        ];
        let files = vec![
            rec(Category::FileShare, "recent_file", None, "f-none"),
            rec(Category::FileShare, "recent_file", Some(at(7, 0)), "f-07"),
        ];
        let apps = vec![rec(Category::AppUsage, "running_process", Some(at(9, 30)), "a-0930")];

        let result = aggregate(logins, files, apps);

        assert_eq!(
            keys(&result.records),
            vec!["f-07", "a-0930", "l-12", "l-none-1", "l-none-2", "f-none"]
        );

        let stamps: Vec<_> = result.records.iter().filter_map(|r| r.timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_equal_timestamps_break_by_category_then_discovery() {
        let t = at(11, 11);
        let build = || {
            aggregate(
                vec![
                    rec(Category::Login, "session", Some(t), "l1"),
                    rec(Category::Login, "current", Some(t), "l2"),
                ],
                vec![rec(Category::FileShare, "recent_file", Some(t), "f1")],
                vec![
                    rec(Category::AppUsage, "running_process", Some(t), "a1"),
                    rec(Category::AppUsage, "running_process", Some(t), "a2"),
                ],
            )
        };

        let first = build();
        let second = build();

        assert_eq!(keys(&first.records), vec!["l1", "l2", "f1", "a1", "a2"]);
        assert_eq!(
            serde_json::to_string(&first.records).unwrap(),
            serde_json::to_string(&second.records).unwrap()
        );
    }

    #[test]
    fn test_exact_duplicates_collapse_within_category_only() {
        let dup = rec(Category::FileShare, "network_drive", Some(at(9, 0)), "Z:");
        let result = aggregate(
            vec![],
            vec![dup.clone(), dup.clone()],
            vec![],
        );
        assert_eq!(result.records.len(), 1);

        // Same attributes in another category are a distinct record
        let as_app = rec(Category::AppUsage, "network_drive", Some(at(9, 0)), "Z:");
        let result = aggregate(vec![], vec![dup], vec![as_app]);
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_dedup_keeps_near_duplicates() {
        let a = rec(Category::FileShare, "recent_file", Some(at(9, 0)), "a.txt");
        let b = rec(Category::FileShare, "recent_file", Some(at(9, 1)), "a.txt");
        let (kept, collapsed) = dedup_exact(vec![a.clone(), b, a]);
        assert_eq!(kept.len(), 2);
        assert_eq!(collapsed, 1);
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate(vec![], vec![], vec![]);
        assert!(result.records.is_empty());
        assert_eq!(result.summary.total, 0);
        assert!(result.summary.time_span.is_none());
    }

    #[test]
    fn test_sources_are_tracked_per_category() {
        let mut a = Attributes::new();
        a.insert("key".into(), "x".into());
        let reg = Record::new(Category::AppUsage, "installed_app", "registry", None, a.clone());
        let proc = Record::new(Category::AppUsage, "running_process", "process_table", None, a);

        let result = aggregate(vec![], vec![], vec![reg, proc]);
        let sources = &result.summary.sources[&Category::AppUsage];
        assert_eq!(sources.len(), 2);
        assert!(sources.contains("registry"));
    }
}
