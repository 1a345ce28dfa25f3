use super::*;
use crate::logic::adapter::Diagnostic;
use crate::logic::aggregator::aggregate;
use crate::logic::record::{Attributes, Category, Record, Scalar};
use chrono::TimeZone;
use tempfile::TempDir;

fn system_info() -> SystemInfo {
    SystemInfo {
        platform: "Linux".into(),
        platform_version: "6.1".into(),
        machine: "x86_64".into(),
        processor: "Test CPU".into(),
        hostname: "ws-01".into(),
        username: "alice".into(),
    }
}

fn record(category: Category, kind: &str, minute: u32, attrs: &[(&str, Scalar)]) -> Record {
    let attributes: Attributes = attrs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 9, minute, 0).unwrap();
    Record::new(category, kind, "test", Some(ts), attributes)
}

fn logins(n: u32) -> Vec<Record> {
    (0..n)
        .map(|i| record(Category::Login, "session", i % 60, &[("username", format!("user{}", i).into())]))
        .collect()
}

fn sample_input(selection: Selection, diagnostics: Vec<Diagnostic>) -> ReportInput {
    let shares = vec![record(
        Category::FileShare,
        "recent_file",
        3,
        &[("path", "/very/long/path/that/keeps/going/and/going/past/the/limit/report.docx".into())],
    )];
    let apps = vec![
        record(
            Category::AppUsage,
            "running_process",
            4,
            &[
                ("name", "an-extremely-long-process-name-for-testing".into()),
                ("pid", Scalar::Int(4242)),
                ("cpu_percent", Scalar::Float(12.345)),
            ],
        ),
        record(Category::AppUsage, "installed_app", 5, &[("name", "Text Editor".into())]),
    ];
    let logins = if selection.logins { logins(2) } else { Vec::new() };

    ReportInput::new(
        "Test Report",
        DateRange::unbounded(),
        selection,
        aggregate(logins, shares, apps),
        diagnostics,
        system_info(),
    )
}

fn render(sink: &MarkdownReport, input: &ReportInput) -> String {
    let mut buffer = Vec::new();
    sink.render(input, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[test]
fn test_markdown_sections() {
    let doc = render(&MarkdownReport::default(), &sample_input(Selection::all(), Vec::new()));

    assert!(doc.starts_with("# Test Report"));
    assert!(doc.contains("**Employee:** alice"));
    assert!(doc.contains("## Executive Summary"));
    assert!(doc.contains("| Login Events | 2 | From 1 sources |"));
    assert!(doc.contains("| File Shares | 1 |"));
    assert!(doc.contains("| Applications | 2 |"));
    assert!(doc.contains("## Timeline"));
    assert!(doc.contains("### Currently Running Processes"));
    assert!(doc.contains("| 4242 | 12.3 |"));
    assert!(doc.contains("### Installed Applications"));
    assert!(doc.contains("Text Editor"));
    assert!(!doc.contains("## Collection Notes"));
}

#[test]
fn test_long_values_are_truncated() {
    let doc = render(&MarkdownReport::default(), &sample_input(Selection::all(), Vec::new()));

    assert!(doc.contains("| an-extremely-long-process-n... |"));
    assert!(doc.contains("/very/long/path/that/keeps/going/and/going/past..."));
    assert!(!doc.contains("/very/long/path/that/keeps/going/and/going/past/"));
}

#[test]
fn test_truncate_text() {
    assert_eq!(document::truncate_text("short", 30), "short");
    assert_eq!(document::truncate_text("exactly-ten", 11), "exactly-ten");
    assert_eq!(document::truncate_text("abcdefghij", 8), "abcde...");
    assert_eq!(document::truncate_text("ééééé", 4), "é...");
    assert_eq!(document::truncate_text("abcdef", 2), "...");

    let long = "x".repeat(80);
    assert_eq!(document::truncate_text(&long, 50).chars().count(), 50);
}

#[test]
fn test_row_limit_notice() {
    let input = ReportInput::new(
        "Many",
        DateRange::unbounded(),
        Selection::all(),
        aggregate(logins(25), Vec::new(), Vec::new()),
        Vec::new(),
        system_info(),
    );
    let doc = render(&MarkdownReport::default(), &input);

    assert!(doc.contains("_Showing 20 of 25 login events._"));
    assert!(doc.contains("No file shares or recent files found."));
    assert!(doc.contains("No application usage data found."));
}

#[test]
fn test_notes_list_diagnostics_and_unselected_categories() {
    let diagnostic = Diagnostic {
        category: Category::FileShare,
        failure: Some("permission denied: registry".into()),
        cancelled: false,
        malformed_dropped: 0,
        duplicates_collapsed: 0,
    };
    let selection = Selection { logins: false, file_shares: true, app_usage: true };
    let doc = render(&MarkdownReport::default(), &sample_input(selection, vec![diagnostic]));

    assert!(doc.contains("## Collection Notes"));
    assert!(doc.contains("- File Shares not collected: permission denied: registry"));
    assert!(doc.contains("- Login Events not selected for this report."));
    assert!(!doc.contains("## Login Events"));
}

#[test]
fn test_assemble_writes_document_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("footprint.md");
    let input = sample_input(Selection::all(), Vec::new());

    let artifact = assemble(&MarkdownReport::default(), &input, &path).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(artifact.bytes, written.len() as u64);
    assert_eq!(artifact.sha256, hex::encode(Sha256::digest(&written)));
    assert_eq!(artifact.metadata_path, dir.path().join("footprint_metadata.json"));

    let metadata = load_metadata(&path).unwrap();
    assert_eq!(metadata.report_id, input.report_id);
    assert_eq!(metadata.document_sha256, artifact.sha256);
    assert_eq!(metadata.summary, input.aggregate.summary);
    assert_eq!(metadata.records, input.aggregate.records);
    assert_eq!(metadata.system_info.hostname, "ws-01");
    assert!(verify_document(&path, &metadata).unwrap());

    std::fs::write(&path, "edited").unwrap();
    assert!(!verify_document(&path, &metadata).unwrap());
}

#[test]
fn test_assemble_creates_missing_parent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("out.md");

    assemble(&MarkdownReport::default(), &sample_input(Selection::all(), Vec::new()), &path).unwrap();
    assert!(path.is_file());
}

#[test]
fn test_unwritable_destination_is_an_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let path = blocker.join("report.md");

    let err = assemble(&MarkdownReport::default(), &sample_input(Selection::all(), Vec::new()), &path)
        .unwrap_err();
    assert!(matches!(err, AssemblyError::Destination { .. }));
}

#[test]
fn test_load_metadata_missing_sidecar() {
    let dir = TempDir::new().unwrap();
    let err = load_metadata(&dir.path().join("absent.md")).unwrap_err();
    assert!(matches!(err, AssemblyError::Read { .. }));
}
