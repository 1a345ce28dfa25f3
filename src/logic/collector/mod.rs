//! Collector Engine - Per-Category Activity Collection
//!
//! Each category (logins, file shares, app usage) is produced by one
//! `CategorySource`. The platform is detected once at startup and
//! `sources_for` is the only place that picks platform variants.
//!
//! Sources run in parallel on blocking tasks; results come back through a
//! channel and are normalized by the adapter before anything else sees them.

pub mod logins;
pub mod file_shares;
pub mod app_usage;


use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use crate::logic::adapter::{self, AdapterOutput};
use crate::logic::record::Category;

// ============================================================================
// RAW RECORDS
// ============================================================================

/// Loosely-typed record as emitted by a platform collector.
pub type RawRecord = serde_json::Map<String, Value>;

/// Build a raw record from a `json!` object literal
pub fn raw_record(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        _ => RawRecord::new(),
    }
}

/// Output of one source run
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub records: Vec<RawRecord>,
    pub cancelled: bool,
}

impl Collected {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RawRecord) {
        self.records.push(record);
    }

    /// Mark as partial (stopped by cancellation)
    pub fn into_cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("platform API error: {0}")]
    Api(String),

    #[error("collector panicked: {0}")]
    Panicked(String),

    #[error("collector did not respond before the deadline")]
    TimedOut,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CollectionError {
    /// Map an io error, keeping permission failures distinguishable
    pub fn from_io(context: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            CollectionError::PermissionDenied(format!("{}: {}", context, err))
        } else {
            CollectionError::Io(err)
        }
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Shared cancellation flag, checked by sources between items.
///
/// Blocking sources poll `is_cancelled`; async code can await `cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    tripped: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.tripped.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.tripped.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called, immediately if it already was
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// SOURCE CONTRACT
// ============================================================================

/// Capability: produces the ordered raw sequence for one category.
pub trait CategorySource: Send + Sync {
    fn category(&self) -> Category;

    /// Mechanism name for logs
    fn name(&self) -> &'static str;

    fn collect(&self, cancel: &CancelFlag) -> Result<Collected, CollectionError>;
}

/// Source used on platforms without a collector
pub struct UnsupportedSource {
    category: Category,
    os: String,
}

impl UnsupportedSource {
    pub fn new(category: Category, os: &str) -> Self {
        Self { category, os: os.to_string() }
    }
}

impl CategorySource for UnsupportedSource {
    fn category(&self) -> Category {
        self.category
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn collect(&self, _cancel: &CancelFlag) -> Result<Collected, CollectionError> {
        Err(CollectionError::UnsupportedPlatform(self.os.clone()))
    }
}

// ============================================================================
// PLATFORM SELECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Unsupported(String),
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            other => Platform::Unsupported(other.to_string()),
        }
    }
}

/// Which categories the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub logins: bool,
    pub file_shares: bool,
    pub app_usage: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

impl Selection {
    pub fn all() -> Self {
        Self { logins: true, file_shares: true, app_usage: true }
    }

    pub fn includes(&self, category: Category) -> bool {
        match category {
            Category::Login => self.logins,
            Category::FileShare => self.file_shares,
            Category::AppUsage => self.app_usage,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.logins || self.file_shares || self.app_usage)
    }

    pub fn categories(&self) -> Vec<Category> {
        Category::ALL.into_iter().filter(|c| self.includes(*c)).collect()
    }
}

/// Build the selected sources for a platform
pub fn sources_for(platform: &Platform, selection: &Selection) -> Vec<Box<dyn CategorySource>> {
    selection
        .categories()
        .into_iter()
        .map(|category| match category {
            Category::Login => logins::source_for(platform),
            Category::FileShare => file_shares::source_for(platform),
            Category::AppUsage => app_usage::source_for(platform),
        })
        .collect()
}

// ============================================================================
// PROGRESS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started(Category),
    Finished {
        category: Category,
        records: usize,
        failed: bool,
        cancelled: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryState {
    Pending,
    Running,
    Done,
    Failed,
}

/// Pollable per-category status for a front end
#[derive(Debug, Default)]
pub struct ProgressBoard {
    states: RwLock<BTreeMap<Category, CategoryState>>,
}

impl ProgressBoard {
    pub fn new(categories: &[Category]) -> Self {
        let states = categories.iter().map(|c| (*c, CategoryState::Pending)).collect();
        Self { states: RwLock::new(states) }
    }

    pub fn apply(&self, progress: &Progress) {
        let mut states = self.states.write();
        match progress {
            Progress::Started(category) => {
                states.insert(*category, CategoryState::Running);
            }
            Progress::Finished { category, failed, .. } => {
                let state = if *failed { CategoryState::Failed } else { CategoryState::Done };
                states.insert(*category, state);
            }
        }
    }

    pub fn snapshot(&self) -> BTreeMap<Category, CategoryState> {
        self.states.read().clone()
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.states
            .read()
            .values()
            .all(|s| matches!(s, CategoryState::Done | CategoryState::Failed))
    }
}

// ============================================================================
// ORCHESTRATION
// ============================================================================

/// Everything the selected sources produced, one output per category
#[derive(Debug, Default)]
pub struct CollectionRun {
    pub outputs: BTreeMap<Category, AdapterOutput>,
}

impl CollectionRun {
    /// Records for one category (empty if not collected)
    pub fn take(&mut self, category: Category) -> Vec<crate::logic::record::Record> {
        self.outputs
            .get_mut(&category)
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }

    pub fn diagnostics(&self) -> Vec<adapter::Diagnostic> {
        self.outputs.values().filter_map(|o| o.diagnostic.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Deadline after which the cancel flag is tripped
    pub timeout: Duration,
    /// Time sources get to hand back partial results once cancelled
    pub grace: Duration,
}

/// Run every source on its own blocking task and wait for all of them.
///
/// Never fails: a source that errors, panics or never answers becomes an
/// empty output with a diagnostic.
pub async fn collect_all(
    sources: Vec<Box<dyn CategorySource>>,
    cancel: CancelFlag,
    options: CollectOptions,
    progress: Option<mpsc::UnboundedSender<Progress>>,
) -> CollectionRun {
    let expected: Vec<Category> = sources.iter().map(|s| s.category()).collect();
    let (tx, mut rx) = mpsc::channel::<AdapterOutput>(expected.len().max(1));

    for source in sources {
        let tx = tx.clone();
        let cancel = cancel.clone();
        let progress = progress.clone();
        let category = source.category();

        notify(&progress, Progress::Started(category));
        log::debug!("Starting {} collection via {}", category, source.name());

        tokio::task::spawn_blocking(move || {
            let output = adapter::run(source.as_ref(), &cancel);
            notify(
                &progress,
                Progress::Finished {
                    category,
                    records: output.records.len(),
                    failed: output.is_failed(),
                    cancelled: output.is_cancelled(),
                },
            );
            // Receiver gone means the run was abandoned
            let _ = tx.blocking_send(output);
        });
    }
    drop(tx);

    let mut run = CollectionRun::default();
    let deadline = tokio::time::sleep(options.timeout);
    tokio::pin!(deadline);
    // Set once the flag is tripped, by the deadline or from outside
    let mut in_grace = false;

    while run.outputs.len() < expected.len() {
        tokio::select! {
            received = rx.recv() => match received {
                Some(output) => {
                    log::info!(
                        "Collected {} {} records",
                        output.records.len(),
                        output.category
                    );
                    run.outputs.insert(output.category, output);
                }
                None => break,
            },
            _ = cancel.cancelled(), if !in_grace => {
                in_grace = true;
                log::warn!("Collection cancelled, waiting {:?} for remaining sources", options.grace);
                deadline.as_mut().reset(tokio::time::Instant::now() + options.grace);
            }
            _ = &mut deadline => {
                if in_grace {
                    log::warn!("Sources did not return within the grace period");
                    break;
                }
                in_grace = true;
                log::warn!(
                    "Collection deadline of {:?} reached, cancelling remaining sources",
                    options.timeout
                );
                cancel.cancel();
                deadline.as_mut().reset(tokio::time::Instant::now() + options.grace);
            }
        }
    }

    for category in expected {
        run.outputs
            .entry(category)
            .or_insert_with(|| adapter::adapt(category, Err(CollectionError::TimedOut)));
    }

    run
}

fn notify(progress: &Option<mpsc::UnboundedSender<Progress>>, event: Progress) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}
