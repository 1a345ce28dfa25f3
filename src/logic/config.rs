//! Report Configuration
//!
//! Environment-derived defaults; the CLI overrides individual fields.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub title: String,
    pub collect_timeout_secs: u64,
    pub table_rows: usize,
    pub process_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            title: constants::DEFAULT_REPORT_TITLE.to_string(),
            collect_timeout_secs: constants::DEFAULT_COLLECT_TIMEOUT_SECS,
            table_rows: constants::DEFAULT_TABLE_ROWS,
            process_rows: constants::DEFAULT_PROCESS_ROWS,
        }
    }
}

impl ReportConfig {
    pub fn from_env() -> Self {
        Self {
            output_dir: PathBuf::from(constants::get_output_dir()),
            title: constants::get_report_title(),
            collect_timeout_secs: constants::get_collect_timeout_secs(),
            table_rows: constants::get_table_rows(),
            process_rows: constants::get_process_rows(),
        }
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_secs(self.collect_timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(constants::CANCEL_GRACE_SECS)
    }
}
