//! Metadata sidecar (`<report-stem>_metadata.json`)

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{AssemblyError, ReportInput};
use crate::constants::APP_VERSION;
use crate::logic::adapter::Diagnostic;
use crate::logic::aggregator::Summary;
use crate::logic::collector::Selection;
use crate::logic::filter::DateRange;
use crate::logic::record::Record;
use crate::logic::system_info::SystemInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_id: String,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub tool_version: String,
    pub system_info: SystemInfo,
    pub range: DateRange,
    pub selection: Selection,
    pub summary: Summary,
    pub diagnostics: Vec<Diagnostic>,
    pub document_sha256: String,
    pub records: Vec<Record>,
}

impl ReportMetadata {
    pub fn from_input(input: &ReportInput, document_sha256: &str) -> Self {
        Self {
            report_id: input.report_id.clone(),
            title: input.title.clone(),
            generated_at: input.generated_at,
            tool_version: APP_VERSION.to_string(),
            system_info: input.system_info.clone(),
            range: input.range,
            selection: input.selection,
            summary: input.aggregate.summary.clone(),
            diagnostics: input.diagnostics.clone(),
            document_sha256: document_sha256.to_string(),
            records: input.aggregate.records.clone(),
        }
    }

    /// Write as pretty JSON beside `report_path`, returning the sidecar path
    pub fn save(&self, report_path: &Path) -> Result<PathBuf, AssemblyError> {
        let path = metadata_path(report_path);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|source| AssemblyError::Destination {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Sidecar location for a report file
pub fn metadata_path(report_path: &Path) -> PathBuf {
    let stem = report_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    report_path.with_file_name(format!("{}_metadata.json", stem))
}

/// Read back the sidecar of a report
pub fn load_metadata(report_path: &Path) -> Result<ReportMetadata, AssemblyError> {
    let path = metadata_path(report_path);
    let content = fs::read_to_string(&path).map_err(|source| AssemblyError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Whether the document on disk still matches the digest recorded at assembly
pub fn verify_document(report_path: &Path, metadata: &ReportMetadata) -> Result<bool, AssemblyError> {
    let bytes = fs::read(report_path).map_err(|source| AssemblyError::Read {
        path: report_path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)) == metadata.document_sha256)
}
