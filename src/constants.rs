//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every default can be overridden through an environment variable.

/// Default output directory for generated reports (relative to cwd)
pub const DEFAULT_OUTPUT_DIR: &str = "reports";

/// Default report title
pub const DEFAULT_REPORT_TITLE: &str = "Employee Digital Footprint Report";

/// Default base file name for reports
pub const DEFAULT_REPORT_BASENAME: &str = "digital_footprint_report";

/// Default collection deadline (seconds)
pub const DEFAULT_COLLECT_TIMEOUT_SECS: u64 = 120;

/// Grace period for sources to return partial results after cancellation (seconds)
pub const CANCEL_GRACE_SECS: u64 = 5;

/// Default row limit for login / file share / installed app tables
pub const DEFAULT_TABLE_ROWS: usize = 20;

/// Default row limit for the running process table
pub const DEFAULT_PROCESS_ROWS: usize = 15;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Digital Footprint Summarizer";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get report output directory from environment or use default
pub fn get_output_dir() -> String {
    std::env::var("FOOTPRINT_OUTPUT_DIR")
        .unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string())
}

/// Get report title from environment or use default
pub fn get_report_title() -> String {
    std::env::var("FOOTPRINT_REPORT_TITLE")
        .unwrap_or_else(|_| DEFAULT_REPORT_TITLE.to_string())
}

/// Get collection timeout from environment or use default
pub fn get_collect_timeout_secs() -> u64 {
    std::env::var("FOOTPRINT_COLLECT_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_COLLECT_TIMEOUT_SECS)
}

/// Get table row limit from environment or use default
pub fn get_table_rows() -> usize {
    std::env::var("FOOTPRINT_TABLE_ROWS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TABLE_ROWS)
}

/// Get process table row limit from environment or use default
pub fn get_process_rows() -> usize {
    std::env::var("FOOTPRINT_PROCESS_ROWS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PROCESS_ROWS)
}
