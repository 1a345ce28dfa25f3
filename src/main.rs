//! Digital Footprint Summarizer - Command Line Entry Point

mod api;
mod logic;
pub mod constants;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use logic::collector::{CancelFlag, CategoryState, Progress, ProgressBoard, Selection};
use logic::config::ReportConfig;
use logic::filter::{parse_bound, BoundEdge, DateRange};
use logic::record::Category;

#[derive(Parser)]
#[command(name = "footprint", about = "Summarize a workstation's digital footprint", version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Output JSON instead of human text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect activity and write a report (default)
    Report(ReportArgs),
    /// Show basic information about this machine
    SystemInfo,
    /// Show the summary stored beside a generated report
    Inspect {
        /// Path of the report document
        report: PathBuf,
    },
}

#[derive(Args, Clone, Default)]
struct ReportArgs {
    /// Only collect login events
    #[arg(long, conflicts_with_all = ["files_only", "apps_only"])]
    logins_only: bool,

    /// Only collect file shares
    #[arg(long, conflicts_with = "apps_only")]
    files_only: bool,

    /// Only collect application usage
    #[arg(long)]
    apps_only: bool,

    /// Skip login events
    #[arg(long)]
    no_logins: bool,

    /// Skip file shares
    #[arg(long)]
    no_files: bool,

    /// Skip application usage
    #[arg(long)]
    no_apps: bool,

    /// Report path (file or directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report title
    #[arg(short, long)]
    title: Option<String>,

    /// Earliest activity to include (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    start_date: Option<String>,

    /// Latest activity to include (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    end_date: Option<String>,

    /// Collection deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl ReportArgs {
    /// `--*-only` narrows first, then `--no-*` removes from what is left
    fn selection(&self) -> Selection {
        let base = if self.logins_only || self.files_only || self.apps_only {
            Selection {
                logins: self.logins_only,
                file_shares: self.files_only,
                app_usage: self.apps_only,
            }
        } else {
            Selection::all()
        };
        Selection {
            logins: base.logins && !self.no_logins,
            file_shares: base.file_shares && !self.no_files,
            app_usage: base.app_usage && !self.no_apps,
        }
    }

    fn range(&self) -> anyhow::Result<DateRange> {
        let start = self
            .start_date
            .as_deref()
            .map(|s| parse_bound(s, BoundEdge::Start))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .map(|s| parse_bound(s, BoundEdge::End))
            .transpose()?;
        Ok(DateRange::new(start, end))
    }

    fn config(&self) -> ReportConfig {
        let mut config = ReportConfig::from_env();
        if let Some(title) = &self.title {
            config.title = title.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.collect_timeout_secs = secs;
        }
        config
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        match cli.command {
            Some(Commands::Report(args)) => cmd_report(args, cli.json).await,
            Some(Commands::SystemInfo) => cmd_system_info(cli.json),
            Some(Commands::Inspect { report }) => cmd_inspect(report, cli.json),
            None => cmd_report(cli.report, cli.json).await,
        }
    });
    // Abandoned collectors may still be blocked in a platform call
    runtime.shutdown_timeout(Duration::from_secs(constants::CANCEL_GRACE_SECS));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

async fn cmd_report(args: ReportArgs, json: bool) -> anyhow::Result<()> {
    let selection = args.selection();
    if selection.is_empty() {
        bail!("no data categories selected; drop one of the --no-* flags");
    }
    // Reject bad dates before any collection starts
    let range = args.range()?;
    if range.is_inverted() {
        log::warn!("--start-date is after --end-date; the report will contain no activity");
    }

    let request = api::ReportRequest {
        selection,
        range,
        config: args.config(),
        output: args.output.clone(),
    };

    log::info!("Starting {} v{}", constants::APP_NAME, constants::APP_VERSION);

    let cancel = CancelFlag::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing with partial results");
            ctrl_c_cancel.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(rx, selection.categories(), json));

    let outcome = api::generate_report(&request, cancel, Some(tx)).await;
    // Abandoned collectors keep a sender alive; don't wait on them
    let _ = tokio::time::timeout(Duration::from_millis(200), printer).await;
    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let artifact = &outcome.artifact;
    println!();
    println!("Report written to {}", artifact.report_path.display());
    println!("  Metadata: {}", artifact.metadata_path.display());
    println!("  Size:     {} bytes", artifact.bytes);
    println!("  SHA-256:  {}", artifact.sha256);
    println!();
    for category in selection.categories() {
        println!("  {:<14} {}", category.label(), outcome.summary.per_category.get(category));
    }
    println!("  {:<14} {}", "Total", outcome.summary.total);

    let notes: Vec<_> = outcome.diagnostics.iter().filter(|d| d.is_notable()).collect();
    if !notes.is_empty() {
        println!();
        println!("Collection notes:");
        for diagnostic in notes {
            println!("  - {}", diagnostic.describe());
        }
    }
    Ok(())
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<Progress>, categories: Vec<Category>, quiet: bool) {
    let board = ProgressBoard::new(&categories);
    let total = categories.len();

    while let Some(event) = rx.recv().await {
        board.apply(&event);
        if quiet {
            continue;
        }
        let done = board
            .snapshot()
            .values()
            .filter(|s| matches!(s, CategoryState::Done | CategoryState::Failed))
            .count();

        match event {
            Progress::Started(category) => eprintln!("[{}/{}] Collecting {}...", done, total, category.label()),
            Progress::Finished { category, records, failed, cancelled } => {
                let status = if failed {
                    "failed".to_string()
                } else if cancelled {
                    format!("{} records (partial)", records)
                } else {
                    format!("{} records", records)
                };
                eprintln!("[{}/{}] {}: {}", done, total, category.label(), status);
            }
        }
    }
}

// ============================================================================
// SYSTEM INFO / INSPECT
// ============================================================================

fn cmd_system_info(json: bool) -> anyhow::Result<()> {
    let info = api::get_system_info();
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    for (label, value) in info.fields() {
        println!("{:<18} {}", label, value);
    }
    Ok(())
}

fn cmd_inspect(report: PathBuf, json: bool) -> anyhow::Result<()> {
    let metadata = api::inspect_report(&report)
        .with_context(|| format!("no readable metadata for {}", report.display()))?;
    let intact = api::verify_report(&report, &metadata).ok();

    if json {
        let view = serde_json::json!({
            "report_id": metadata.report_id,
            "title": metadata.title,
            "generated_at": metadata.generated_at,
            "tool_version": metadata.tool_version,
            "range": metadata.range,
            "selection": metadata.selection,
            "summary": metadata.summary,
            "diagnostics": metadata.diagnostics,
            "document_sha256": metadata.document_sha256,
            "document_intact": intact,
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let summary = &metadata.summary;
    println!("{}", metadata.title);
    println!("  Report ID:  {}", metadata.report_id);
    println!("  Generated:  {}", metadata.generated_at.to_rfc3339());
    println!("  Host:       {}", metadata.system_info.hostname);
    println!("  Employee:   {}", metadata.system_info.username);
    if let Some(span) = &summary.time_span {
        println!("  Activity:   {} to {}", span.earliest.to_rfc3339(), span.latest.to_rfc3339());
    }
    println!();
    for category in Category::ALL {
        println!("  {:<14} {}", category.label(), summary.per_category.get(category));
    }
    println!("  {:<14} {}", "Total", summary.total);
    println!("  {:<14} {}", "Untimestamped", summary.untimestamped);

    match intact {
        Some(true) => println!("\nDocument matches its recorded SHA-256."),
        Some(false) => println!("\nWARNING: document was modified after it was generated."),
        None => println!("\nDocument not found; only metadata was checked."),
    }

    for diagnostic in &metadata.diagnostics {
        println!("  - {}", diagnostic.describe());
    }
    Ok(())
}
