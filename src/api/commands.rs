//! Commands - Operations exposed to front ends
//!
//! Glue between collection, filtering, aggregation and report assembly.
//! The CLI is the only front end today; everything here is front-end agnostic.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::constants;
use crate::logic::adapter::Diagnostic;
use crate::logic::aggregator::{self, Aggregate, Summary};
use crate::logic::collector::{self, CancelFlag, CollectOptions, CollectionRun, Platform, Progress, Selection};
use crate::logic::config::ReportConfig;
use crate::logic::filter::{filter_records, DateRange};
use crate::logic::record::Category;
use crate::logic::report::{self, output, AssemblyError, MarkdownReport, ReportArtifact, ReportInput, ReportMetadata, ReportSink};
use crate::logic::system_info::SystemInfo;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One report generation request
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub selection: Selection,
    pub range: DateRange,
    pub config: ReportConfig,
    /// Explicit destination; defaults to a unique name in `config.output_dir`
    pub output: Option<PathBuf>,
}

/// Result of a generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub artifact: ReportArtifact,
    pub summary: Summary,
    pub diagnostics: Vec<Diagnostic>,
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Collect the selected categories on this machine
pub async fn collect_data(
    selection: &Selection,
    config: &ReportConfig,
    cancel: CancelFlag,
    progress: Option<mpsc::UnboundedSender<Progress>>,
) -> CollectionRun {
    let platform = Platform::detect();
    log::info!("Collecting {:?} on {:?}", selection.categories(), platform);

    let sources = collector::sources_for(&platform, selection);
    let options = CollectOptions {
        timeout: config.collect_timeout(),
        grace: config.cancel_grace(),
    };
    collector::collect_all(sources, cancel, options, progress).await
}

/// Filter each category by `range`, then merge into one ordered aggregate
pub fn build_aggregate(run: &mut CollectionRun, range: &DateRange) -> Aggregate {
    let logins = filter_records(run.take(Category::Login), range);
    let file_shares = filter_records(run.take(Category::FileShare), range);
    let app_usage = filter_records(run.take(Category::AppUsage), range);
    aggregator::aggregate(logins, file_shares, app_usage)
}

/// Full pipeline: collect, filter, aggregate and assemble.
///
/// Only assembly failures are returned; collection problems end up in
/// `ReportOutcome::diagnostics` and in the document itself.
pub async fn generate_report(
    request: &ReportRequest,
    cancel: CancelFlag,
    progress: Option<mpsc::UnboundedSender<Progress>>,
) -> Result<ReportOutcome, AssemblyError> {
    let mut run = collect_data(&request.selection, &request.config, cancel, progress).await;
    let diagnostics = run.diagnostics();
    let aggregate = build_aggregate(&mut run, &request.range);

    log::info!(
        "Aggregated {} records ({} login, {} file share, {} app usage)",
        aggregate.summary.total,
        aggregate.summary.per_category.login,
        aggregate.summary.per_category.file_share,
        aggregate.summary.per_category.app_usage
    );

    let sink = MarkdownReport::from_config(&request.config);
    let path = report_path(request, &sink)?;
    let input = ReportInput::new(
        request.config.title.clone(),
        request.range,
        request.selection,
        aggregate,
        diagnostics,
        SystemInfo::collect(),
    );

    let artifact = report::assemble(&sink, &input, &path).map_err(|e| {
        log::error!("Report assembly failed: {}", e);
        e
    })?;

    Ok(ReportOutcome {
        artifact,
        summary: input.aggregate.summary,
        diagnostics: input.diagnostics,
    })
}

fn report_path(request: &ReportRequest, sink: &dyn ReportSink) -> Result<PathBuf, AssemblyError> {
    match &request.output {
        Some(path) => Ok(output::resolve_output_path(
            path,
            constants::DEFAULT_REPORT_BASENAME,
            sink.extension(),
        )),
        None => {
            let dir = output::create_output_directory(&request.config.output_dir)?;
            Ok(output::unique_filename(&dir, constants::DEFAULT_REPORT_BASENAME, sink.extension()))
        }
    }
}

pub fn get_system_info() -> SystemInfo {
    SystemInfo::collect()
}

/// Metadata stored beside a previously generated report
pub fn inspect_report(report_path: &Path) -> Result<ReportMetadata, AssemblyError> {
    report::load_metadata(report_path)
}

/// Whether a report still matches the digest in its sidecar
pub fn verify_report(report_path: &Path, metadata: &ReportMetadata) -> Result<bool, AssemblyError> {
    report::verify_document(report_path, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::adapter::adapt;
    use crate::logic::collector::{raw_record, Collected};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn collected(values: Vec<serde_json::Value>) -> Collected {
        let mut out = Collected::new();
        for value in values {
            out.push(raw_record(value));
        }
        out
    }

    #[test]
    fn test_build_aggregate_filters_each_category() {
        let mut run = CollectionRun::default();
        run.outputs.insert(
            Category::Login,
            adapt(
                Category::Login,
                Ok(collected(vec![
                    json!({ "username": "alice", "timestamp": "2024-03-04T09:00:00Z" }),
                    json!({ "username": "bob", "timestamp": "2024-03-04T09:05:00Z" }),
                ])),
            ),
        );
        run.outputs.insert(
            Category::FileShare,
            adapt(
                Category::FileShare,
                Ok(collected(vec![json!({ "path": "/srv/a", "timestamp": "2024-03-04T09:03:00Z" })])),
            ),
        );

        let range = DateRange::new(
            Some(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2024, 3, 4, 9, 4, 0).unwrap()),
        );
        let aggregate = build_aggregate(&mut run, &range);

        assert_eq!(aggregate.summary.total, 2);
        assert_eq!(aggregate.records[0].attr_text("username"), "alice");
        assert_eq!(aggregate.records[1].attr_text("path"), "/srv/a");
    }

    #[test]
    fn test_report_path_defaults_to_output_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ReportConfig {
            output_dir: dir.path().join("reports"),
            ..ReportConfig::default()
        };
        let request = ReportRequest {
            selection: Selection::all(),
            range: DateRange::unbounded(),
            config,
            output: None,
        };

        let path = report_path(&request, &MarkdownReport::default()).unwrap();
        assert_eq!(path, dir.path().join("reports").join("digital_footprint_report.md"));
        assert!(dir.path().join("reports").is_dir());
    }
}
