//! Report Assembler - Aggregated Records -> Document + Metadata Sidecar
//!
//! A `ReportSink` renders the document; `assemble` writes it, hashes it and
//! stores the metadata sidecar next to it. Assembly errors are the only
//! errors in the pipeline that reach the caller.

pub mod document;
pub mod metadata;
pub mod output;

#[cfg(test)]
mod tests;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::adapter::Diagnostic;
use crate::logic::aggregator::Aggregate;
use crate::logic::collector::Selection;
use crate::logic::filter::DateRange;
use crate::logic::system_info::SystemInfo;

pub use document::MarkdownReport;
pub use metadata::{load_metadata, verify_document, ReportMetadata};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("cannot write to {}: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render report: {0}")]
    Render(#[source] std::io::Error),

    #[error("failed to serialize report metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// INPUT / OUTPUT
// ============================================================================

/// Everything a sink needs to render one report
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub report_id: String,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub range: DateRange,
    pub selection: Selection,
    pub aggregate: Aggregate,
    pub diagnostics: Vec<Diagnostic>,
    pub system_info: SystemInfo,
}

impl ReportInput {
    pub fn new(
        title: impl Into<String>,
        range: DateRange,
        selection: Selection,
        aggregate: Aggregate,
        diagnostics: Vec<Diagnostic>,
        system_info: SystemInfo,
    ) -> Self {
        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            generated_at: Utc::now(),
            range,
            selection,
            aggregate,
            diagnostics,
            system_info,
        }
    }
}

/// Written report on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub report_id: String,
    pub report_path: PathBuf,
    pub metadata_path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Output format capability
pub trait ReportSink {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    fn render(&self, input: &ReportInput, out: &mut dyn Write) -> std::io::Result<()>;
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// Render `input` to `path` and write the metadata sidecar beside it.
pub fn assemble(sink: &dyn ReportSink, input: &ReportInput, path: &Path) -> Result<ReportArtifact, AssemblyError> {
    let mut buffer = Vec::new();
    sink.render(input, &mut buffer).map_err(AssemblyError::Render)?;

    let sha256 = hex::encode(Sha256::digest(&buffer));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AssemblyError::Destination {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, &buffer).map_err(|source| AssemblyError::Destination {
        path: path.to_path_buf(),
        source,
    })?;

    let metadata = ReportMetadata::from_input(input, &sha256);
    let metadata_path = metadata.save(path)?;

    log::info!(
        "Report {} written to {:?} ({} bytes)",
        input.report_id,
        path,
        buffer.len()
    );

    Ok(ReportArtifact {
        report_id: input.report_id.clone(),
        report_path: path.to_path_buf(),
        metadata_path,
        bytes: buffer.len() as u64,
        sha256,
    })
}
