//! Collector Adapter - Raw Platform Output -> Canonical Records
//!
//! Wraps exactly one source call per category. Whatever happens inside the
//! source (error, panic, cancellation) the adapter hands back an ordered
//! sequence and, when something went wrong, a `Diagnostic`.

pub mod schema;


use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::logic::aggregator;
use crate::logic::collector::{CancelFlag, CategorySource, Collected, CollectionError};
use crate::logic::record::{Category, Record};

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Non-fatal note about a category's collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: Category,
    /// Why the underlying source failed (records are empty when set)
    pub failure: Option<String>,
    /// Stopped early; records are partial
    pub cancelled: bool,
    pub malformed_dropped: usize,
    pub duplicates_collapsed: usize,
}

impl Diagnostic {
    fn new(category: Category) -> Self {
        Self {
            category,
            failure: None,
            cancelled: false,
            malformed_dropped: 0,
            duplicates_collapsed: 0,
        }
    }

    /// Something the report reader should be told about
    pub fn is_notable(&self) -> bool {
        self.failure.is_some() || self.cancelled || self.malformed_dropped > 0
    }

    /// One-line human description
    pub fn describe(&self) -> String {
        if let Some(reason) = &self.failure {
            return format!("{} not collected: {}", self.category.label(), reason);
        }

        let mut parts = Vec::new();
        if self.cancelled {
            parts.push("collection was cancelled, results are partial".to_string());
        }
        if self.malformed_dropped > 0 {
            parts.push(format!("{} malformed record(s) dropped", self.malformed_dropped));
        }
        if self.duplicates_collapsed > 0 {
            parts.push(format!("{} duplicate(s) collapsed", self.duplicates_collapsed));
        }
        format!("{}: {}", self.category.label(), parts.join("; "))
    }
}

// ============================================================================
// ADAPTER OUTPUT
// ============================================================================

#[derive(Debug, Clone)]
pub struct AdapterOutput {
    pub category: Category,
    /// Discovery order, not time order
    pub records: Vec<Record>,
    pub diagnostic: Option<Diagnostic>,
}

impl AdapterOutput {
    pub fn is_failed(&self) -> bool {
        self.diagnostic.as_ref().map_or(false, |d| d.failure.is_some())
    }

    pub fn is_cancelled(&self) -> bool {
        self.diagnostic.as_ref().map_or(false, |d| d.cancelled)
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

/// Run one source in isolation and normalize its output.
pub fn run(source: &dyn CategorySource, cancel: &CancelFlag) -> AdapterOutput {
    let category = source.category();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| source.collect(cancel))) {
        Ok(result) => result,
        Err(payload) => Err(CollectionError::Panicked(panic_message(payload.as_ref()))),
    };
    adapt(category, result)
}

/// Normalize a source result into canonical records.
pub fn adapt(category: Category, result: Result<Collected, CollectionError>) -> AdapterOutput {
    match result {
        Ok(collected) => normalize(category, collected),
        Err(e) => {
            log::warn!("{} collection failed: {}", category, e);
            let mut diagnostic = Diagnostic::new(category);
            diagnostic.failure = Some(e.to_string());
            AdapterOutput {
                category,
                records: Vec::new(),
                diagnostic: Some(diagnostic),
            }
        }
    }
}

fn normalize(category: Category, collected: Collected) -> AdapterOutput {
    let schema = schema::for_category(category);
    let mut diagnostic = Diagnostic::new(category);
    diagnostic.cancelled = collected.cancelled;

    let mut records = Vec::with_capacity(collected.records.len());
    for raw in &collected.records {
        match schema.coerce(raw) {
            Ok(record) => records.push(record),
            Err(e) => {
                diagnostic.malformed_dropped += 1;
                log::debug!("Dropped malformed {} record: {}", category, e);
            }
        }
    }

    let (records, collapsed) = aggregator::dedup_exact(records);
    diagnostic.duplicates_collapsed = collapsed;

    if diagnostic.malformed_dropped > 0 {
        log::warn!(
            "{}: dropped {} malformed record(s)",
            category,
            diagnostic.malformed_dropped
        );
    }

    AdapterOutput {
        category,
        records,
        diagnostic: diagnostic.is_notable().then_some(diagnostic),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
