use anyhow::Result;
use clap::{Parser, ValueEnum};
use schemasync::presentation::cli_summary::print_summary;
use schemasync::presentation::writers::{sql::format_plan, write_to_file, writer_for};
use schemasync::{AppConfig, LogLevel, RowFilter, SyncMode};
use tokio::sync::watch;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "schemasync",
    about = "Schemasync — Propagate one master MySQL schema (and data) to many destinations."
)]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Synchronization policy to apply to every destination.
    #[arg(short, long, value_enum)]
    mode: Mode,

    /// Row filter for data-only mode, spliced verbatim into the source
    /// SELECT (e.g. "id > 100").
    #[arg(long = "where")]
    filter: Option<String>,

    /// Generate and print the DDL without executing anything.
    #[arg(long)]
    dry_run: bool,

    /// Write the run report to this directory ("json" or "sql" format).
    #[arg(long)]
    report_dir: Option<String>,

    #[arg(short, long, default_value = "json")]
    format: String,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Replace destination schemas with the master schema.
    Overwrite,
    /// Add missing tables, columns, indexes and routines only.
    Update,
    /// Copy rows into already-synchronized destinations.
    DataOnly,
}

impl From<Mode> for SyncMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Overwrite => SyncMode::Overwrite,
            Mode::Update => SyncMode::Update,
            Mode::DataOnly => SyncMode::DataOnly,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LogLevel::Error
    } else if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    schemasync::init_tracing(level);

    let cfg = AppConfig::load(&cli.config)?;
    let mode: SyncMode = cli.mode.into();

    if cli.dry_run {
        let plans = schemasync::plan(&cfg, mode).await?;
        print!("{}", format_plan(&plans));
        return Ok(());
    }

    // Ctrl-C flips the cancel signal; in-flight statements finish, nothing
    // further is issued.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight statements");
            let _ = cancel_tx.send(true);
        }
    });

    let filter = match &cli.filter {
        Some(expr) => RowFilter::expr(expr.clone()),
        None => RowFilter::none(),
    };

    let report = schemasync::run_with_cancel(&cfg, mode, filter, cancel_rx).await?;

    if !cli.quiet {
        print_summary(&report);
    }

    if let Some(dir) = &cli.report_dir {
        let writer = writer_for(&cli.format)
            .ok_or_else(|| anyhow::anyhow!("Unknown format: {}", cli.format))?;
        write_to_file(&*writer, &report, dir)?;
        println!("Report written to {dir}");
    }

    std::process::exit(report.status.exit_code());
}
