//! CLI entry point for `mailharvest`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailharvest::config::{self, Config};
use mailharvest::model::report::{Disposition, RunSummary};
use mailharvest::pipeline::Pipeline;
use mailharvest::service::memory::MemoryMailService;

#[derive(Parser)]
#[command(name = "mailharvest", version, about = "Deduplicated, resumable mail ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file to load instead of the standard locations
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mailbox snapshot (JSON) to ingest from
    #[arg(short, long, global = true, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Subject keywords; one query is issued per keyword
    #[arg(long, global = true, value_delimiter = ',', value_name = "KW,KW")]
    subjects: Vec<String>,

    /// Attachment extension allow-list
    #[arg(long, global = true, value_delimiter = ',', value_name = "EXT,EXT")]
    types: Vec<String>,

    /// Root directory for downloaded files
    #[arg(short, long, global = true, value_name = "DIR")]
    downloads: Option<PathBuf>,

    /// Named date window: today, yesterday, week, month, year, or Nd
    #[arg(long, global = true, value_name = "RANGE", conflicts_with_all = ["from", "to"])]
    range: Option<String>,

    /// Window start, %Y/%m/%d
    #[arg(long, global = true, value_name = "DATE", requires = "to")]
    from: Option<String>,

    /// Window end, %Y/%m/%d
    #[arg(long, global = true, value_name = "DATE", requires = "from")]
    to: Option<String>,

    /// Maximum messages to newly process this run
    #[arg(short, long, global = true, value_name = "N")]
    limit: Option<usize>,

    /// Skip writing the per-message content text file
    #[arg(long, global = true)]
    no_content: bool,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion pass (the default)
    Run,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        Some(Commands::Run) | None => {}
    }

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Configure logging: stderr + optional daily-rolling log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    apply_overrides(&mut config, &cli);
    cmd_run(&config, cli.snapshot.as_deref(), cli.json)
}

/// Command-line flags override the corresponding config values.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if !cli.subjects.is_empty() {
        config.search.subjects = cli.subjects.clone();
    }
    if !cli.types.is_empty() {
        config.download.file_types = cli.types.clone();
    }
    if let Some(ref downloads) = cli.downloads {
        config.download.root = downloads.clone();
    }
    if let Some(ref range) = cli.range {
        config.search.date_range = range.clone();
    }
    // Explicit dates displace a date range from the config file; clap
    // already rejects mixing them on the command line itself.
    if let Some(ref from) = cli.from {
        config.search.start_date = from.clone();
        config.search.date_range.clear();
    }
    if let Some(ref to) = cli.to {
        config.search.end_date = to.clone();
        config.search.date_range.clear();
    }
    if let Some(limit) = cli.limit {
        config.download.limit = limit;
    }
    if cli.no_content {
        config.download.content = false;
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if config.general.log_to_file {
        let dir = config::log_dir(config);
        if std::fs::create_dir_all(&dir).is_ok() {
            let file_appender = tracing_appender::rolling::daily(&dir, "mailharvest.log");
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            return;
        }
        // Fall back to stderr only
    }
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

/// Run one ingestion pass and print the summary.
fn cmd_run(config: &Config, snapshot: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let service = match snapshot {
        Some(path) => MemoryMailService::from_snapshot_file(path)?,
        None => {
            anyhow::bail!("no mail backend configured; pass --snapshot <FILE>");
        }
    };

    let start = Instant::now();
    let mut pipeline = Pipeline::new(service, config)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Processing [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let summary = pipeline.run_with_progress(Some(&|handled, total| {
        pb.set_length(total as u64);
        pb.set_position(handled as u64);
        true
    }))?;

    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if json {
        print_summary_json(&summary, elapsed)?;
    } else {
        print_summary_table(config, &summary, elapsed);
    }

    Ok(())
}

/// Print the run summary as a human-readable table.
fn print_summary_table(config: &Config, summary: &RunSummary, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<25} {}", "Candidates", summary.candidates);
    println!("  {:<25} {}", "Processed", summary.processed);
    println!("  {:<25} {}", "Skipped (already done)", summary.skipped);
    println!("  {:<25} {}", "Failed", summary.failed);
    println!("  {:<25} {}", "Attachments saved", summary.attachments_saved);
    if summary.attachments_failed > 0 {
        println!(
            "  {:<25} {}",
            "Attachments failed", summary.attachments_failed
        );
    }
    println!("  {:<25} {}", "Content files", summary.content_written);
    println!(
        "  {:<25} {}",
        "Bytes written",
        format_size(summary.bytes_written, BINARY)
    );
    println!(
        "  {:<25} {}",
        "Download root",
        config.download.root.display()
    );
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(summary: &RunSummary, elapsed: std::time::Duration) -> anyhow::Result<()> {
    let outcomes: Vec<serde_json::Value> = summary
        .outcomes
        .iter()
        .map(|o| {
            serde_json::json!({
                "id": o.id,
                "disposition": match o.disposition {
                    Disposition::Skipped => "skipped",
                    Disposition::Recorded => "recorded",
                    Disposition::Failed => "failed",
                },
                "fetched": o.fetched,
                "folder": o.folder.as_ref().map(|f| f.to_string_lossy()),
                "attachments_saved": o.attachments_saved,
                "attachments_failed": o.attachments_failed,
                "content_saved": o.content_saved,
            })
        })
        .collect();

    let output = serde_json::json!({
        "candidates": summary.candidates,
        "processed": summary.processed,
        "skipped": summary.skipped,
        "failed": summary.failed,
        "attachments_saved": summary.attachments_saved,
        "attachments_failed": summary.attachments_failed,
        "content_written": summary.content_written,
        "bytes_written": summary.bytes_written,
        "elapsed_ms": elapsed.as_millis(),
        "outcomes": outcomes,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailharvest", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
