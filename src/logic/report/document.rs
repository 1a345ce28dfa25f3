//! Markdown report document

use std::io::Write;

use chrono::{DateTime, Local, Utc};

use super::{ReportInput, ReportSink};
use crate::constants;
use crate::logic::config::ReportConfig;
use crate::logic::record::{Category, Record};

const DISCLAIMER: &str = "This report contains digital activity data collected from the user's system. \
Use this information responsibly and in compliance with applicable privacy laws and company policies.";

const PATH_WIDTH: usize = 50;
const PROCESS_NAME_WIDTH: usize = 30;
const APP_NAME_WIDTH: usize = 50;

/// Renders a self-contained Markdown document
#[derive(Debug, Clone)]
pub struct MarkdownReport {
    pub table_rows: usize,
    pub process_rows: usize,
}

impl Default for MarkdownReport {
    fn default() -> Self {
        Self {
            table_rows: constants::DEFAULT_TABLE_ROWS,
            process_rows: constants::DEFAULT_PROCESS_ROWS,
        }
    }
}

impl MarkdownReport {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            table_rows: config.table_rows,
            process_rows: config.process_rows,
        }
    }
}

impl ReportSink for MarkdownReport {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, input: &ReportInput, out: &mut dyn Write) -> std::io::Result<()> {
        write_title(input, out)?;
        write_summary(input, out)?;
        write_notes(input, out)?;
        self.write_timeline(input, out)?;

        if input.selection.logins {
            self.write_logins(&of_category(input, Category::Login), out)?;
        }
        if input.selection.file_shares {
            self.write_file_shares(&of_category(input, Category::FileShare), out)?;
        }
        if input.selection.app_usage {
            self.write_app_usage(&of_category(input, Category::AppUsage), out)?;
        }

        writeln!(out, "---")?;
        writeln!(out)?;
        writeln!(
            out,
            "_Generated by {} v{} (report {})_",
            constants::APP_NAME,
            constants::APP_VERSION,
            input.report_id
        )
    }
}

// ============================================================================
// FORMATTING HELPERS
// ============================================================================

/// Cut to at most `max` characters, the last three being `...`
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Local wall-clock time
pub fn format_timestamp(ts: Option<DateTime<Utc>>, fmt: &str) -> String {
    ts.map(|t| t.with_timezone(&Local).format(fmt).to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn cell(value: &str) -> String {
    let value = value.replace('|', "\\|").replace('\n', " ");
    if value.trim().is_empty() {
        "Unknown".to_string()
    } else {
        value
    }
}

fn table_header(out: &mut dyn Write, columns: &[&str]) -> std::io::Result<()> {
    writeln!(out, "| {} |", columns.join(" | "))?;
    writeln!(out, "|{}", "---|".repeat(columns.len()))
}

fn table_row(out: &mut dyn Write, cells: &[String]) -> std::io::Result<()> {
    let cells: Vec<String> = cells.iter().map(|c| cell(c)).collect();
    writeln!(out, "| {} |", cells.join(" | "))
}

fn showing(out: &mut dyn Write, shown: usize, total: usize, noun: &str) -> std::io::Result<()> {
    if total > shown {
        writeln!(out)?;
        writeln!(out, "_Showing {} of {} {}._", shown, total, noun)?;
    }
    Ok(())
}

fn of_category(input: &ReportInput, category: Category) -> Vec<&Record> {
    input
        .aggregate
        .records
        .iter()
        .filter(|r| r.category() == category)
        .collect()
}

fn describe_period(input: &ReportInput) -> String {
    let range = &input.range;
    if range.is_unbounded() {
        return "All available data".to_string();
    }
    let start = range
        .start
        .map(|s| format_timestamp(Some(s), "%Y-%m-%d %H:%M"))
        .unwrap_or_else(|| "the beginning".to_string());
    let end = range
        .end
        .map(|e| format_timestamp(Some(e), "%Y-%m-%d %H:%M"))
        .unwrap_or_else(|| "now".to_string());
    format!("{} to {}", start, end)
}

/// Main identifying attribute of a record for one-line listings
fn headline(record: &Record) -> &str {
    match record.category() {
        Category::Login => record.attr_text("username"),
        Category::FileShare => record.attr_text("path"),
        Category::AppUsage => record.attr_text("name"),
    }
}

// ============================================================================
// SECTIONS
// ============================================================================

fn write_title(input: &ReportInput, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "# {}", input.title)?;
    writeln!(out)?;
    writeln!(out, "**Employee:** {}  ", input.system_info.username)?;
    writeln!(out, "**Host:** {}  ", input.system_info.hostname)?;
    writeln!(
        out,
        "**Report Generated:** {}  ",
        format_timestamp(Some(input.generated_at), "%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "**Report Period:** {}", describe_period(input))?;
    writeln!(out)?;
    writeln!(out, "> {}", DISCLAIMER)?;
    writeln!(out)
}

fn write_summary(input: &ReportInput, out: &mut dyn Write) -> std::io::Result<()> {
    let summary = &input.aggregate.summary;
    let login_sources = summary.sources.get(&Category::Login).map_or(0, |s| s.len());
    let period = summary
        .time_span
        .as_ref()
        .map(|span| {
            format!(
                "{} to {}",
                format_timestamp(Some(span.earliest), "%Y-%m-%d %H:%M"),
                format_timestamp(Some(span.latest), "%Y-%m-%d %H:%M")
            )
        })
        .unwrap_or_else(|| "N/A".to_string());

    writeln!(out, "## Executive Summary")?;
    writeln!(out)?;
    table_header(out, &["Metric", "Count", "Details"])?;
    table_row(
        out,
        &[
            Category::Login.label().to_string(),
            summary.per_category.login.to_string(),
            format!("From {} sources", login_sources),
        ],
    )?;
    table_row(
        out,
        &[
            Category::FileShare.label().to_string(),
            summary.per_category.file_share.to_string(),
            "Recent files and network drives".to_string(),
        ],
    )?;
    table_row(
        out,
        &[
            Category::AppUsage.label().to_string(),
            summary.per_category.app_usage.to_string(),
            "Running processes and installed apps".to_string(),
        ],
    )?;
    table_row(
        out,
        &[
            "Report Period".to_string(),
            period,
            format!("Generated on {}", format_timestamp(Some(input.generated_at), "%Y-%m-%d")),
        ],
    )?;
    writeln!(out)?;
    writeln!(out, "Total records: **{}**", summary.total)?;
    writeln!(out)
}

fn write_notes(input: &ReportInput, out: &mut dyn Write) -> std::io::Result<()> {
    let mut notes: Vec<String> = input
        .diagnostics
        .iter()
        .filter(|d| d.is_notable())
        .map(|d| d.describe())
        .collect();

    for category in Category::ALL {
        if !input.selection.includes(category) {
            notes.push(format!("{} not selected for this report.", category.label()));
        }
    }

    if notes.is_empty() {
        return Ok(());
    }

    writeln!(out, "## Collection Notes")?;
    writeln!(out)?;
    for note in notes {
        writeln!(out, "- {}", note)?;
    }
    writeln!(out)
}

impl MarkdownReport {
    fn write_timeline(&self, input: &ReportInput, out: &mut dyn Write) -> std::io::Result<()> {
        let timed: Vec<&Record> = input
            .aggregate
            .records
            .iter()
            .filter(|r| r.timestamp().is_some())
            .collect();

        writeln!(out, "## Timeline")?;
        writeln!(out)?;
        if timed.is_empty() {
            writeln!(out, "No timestamped activity found.")?;
            return writeln!(out);
        }

        table_header(out, &["Time", "Category", "Type", "Detail"])?;
        for record in timed.iter().take(self.table_rows) {
            table_row(
                out,
                &[
                    format_timestamp(record.timestamp(), "%Y-%m-%d %H:%M"),
                    record.category().label().to_string(),
                    record.kind().to_string(),
                    truncate_text(headline(record), PATH_WIDTH),
                ],
            )?;
        }
        showing(out, timed.len().min(self.table_rows), timed.len(), "timestamped events")?;
        writeln!(out)
    }

    fn write_logins(&self, logins: &[&Record], out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "## Login Events")?;
        writeln!(out)?;
        if logins.is_empty() {
            writeln!(out, "No login events found.")?;
            return writeln!(out);
        }

        table_header(out, &["Timestamp", "Username", "Host", "Type", "Source"])?;
        for login in logins.iter().take(self.table_rows) {
            table_row(
                out,
                &[
                    format_timestamp(login.timestamp(), "%Y-%m-%d %H:%M"),
                    login.attr_text("username").to_string(),
                    login.attr_text("host").to_string(),
                    login.kind().to_string(),
                    login.source().to_string(),
                ],
            )?;
        }
        showing(out, logins.len().min(self.table_rows), logins.len(), "login events")?;
        writeln!(out)
    }

    fn write_file_shares(&self, shares: &[&Record], out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "## File Shares & Recent Files")?;
        writeln!(out)?;
        if shares.is_empty() {
            writeln!(out, "No file shares or recent files found.")?;
            return writeln!(out);
        }

        table_header(out, &["Path", "Type", "Source", "Last Accessed"])?;
        for share in shares.iter().take(self.table_rows) {
            table_row(
                out,
                &[
                    truncate_text(share.attr_text("path"), PATH_WIDTH),
                    share.kind().to_string(),
                    share.source().to_string(),
                    format_timestamp(share.timestamp(), "%Y-%m-%d %H:%M"),
                ],
            )?;
        }
        showing(out, shares.len().min(self.table_rows), shares.len(), "file shares")?;
        writeln!(out)
    }

    fn write_app_usage(&self, apps: &[&Record], out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "## Application Usage")?;
        writeln!(out)?;
        if apps.is_empty() {
            writeln!(out, "No application usage data found.")?;
            return writeln!(out);
        }

        let processes: Vec<&Record> = apps.iter().copied().filter(|a| a.kind() == "running_process").collect();
        let installed: Vec<&Record> = apps.iter().copied().filter(|a| a.kind() == "installed_app").collect();

        if !processes.is_empty() {
            writeln!(out, "### Currently Running Processes")?;
            writeln!(out)?;
            table_header(out, &["Name", "PID", "CPU %", "Memory %", "Start Time"])?;
            for process in processes.iter().take(self.process_rows) {
                let percent = |key: &str| format!("{:.1}", process.attr(key).and_then(|v| v.as_f64()).unwrap_or(0.0));
                table_row(
                    out,
                    &[
                        truncate_text(process.attr_text("name"), PROCESS_NAME_WIDTH),
                        process.attr("pid").map_or("N/A".to_string(), |p| p.to_string()),
                        percent("cpu_percent"),
                        percent("memory_percent"),
                        format_timestamp(process.timestamp(), "%H:%M"),
                    ],
                )?;
            }
            showing(out, processes.len().min(self.process_rows), processes.len(), "running processes")?;
            writeln!(out)?;
        }

        if !installed.is_empty() {
            writeln!(out, "### Installed Applications")?;
            writeln!(out)?;
            table_header(out, &["Name", "Install Date"])?;
            for app in installed.iter().take(self.table_rows) {
                table_row(
                    out,
                    &[
                        truncate_text(app.attr_text("name"), APP_NAME_WIDTH),
                        format_timestamp(app.timestamp(), "%Y-%m-%d"),
                    ],
                )?;
            }
            showing(out, installed.len().min(self.table_rows), installed.len(), "installed applications")?;
            writeln!(out)?;
        }

        let other = apps.len() - processes.len() - installed.len();
        if other > 0 {
            writeln!(out, "{} other application record(s) not listed.", other)?;
            writeln!(out)?;
        }
        Ok(())
    }
}
