//! Immutable Auditor - status report for immutable Linux hosts
//!
//! Queries the host's diagnostic tools and prints one status tree:
//! - rpm-ostree deployments, layered packages and overrides
//! - Flatpak applications (system + user)
//! - Podman and distrobox containers, toolboxes
//! - Transparent re-dispatch to the host when running inside a sandbox

mod config;
mod render;

use anyhow::{Context, Result};
use auditor_core::{AuditorView, Report, ReportBuilder, SystemRunner};
use clap::Parser;
use config::AuditorConfig;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "immutable_auditor=info,auditor_core=info";

#[derive(Debug, Parser)]
#[command(name = "immutable-auditor", version, about = "Audit the state of an immutable host OS")]
struct Cli {
    /// Print the report as JSON instead of a tree
    #[arg(long)]
    json: bool,

    /// Expand every node
    #[arg(long)]
    all: bool,

    /// Collapse the node at PATH (e.g. "System/Containers"), repeatable
    #[arg(long, value_name = "PATH")]
    collapse: Vec<String>,

    /// Show command details under each row
    #[arg(long)]
    details: bool,

    /// Refresh periodically until interrupted
    #[arg(long)]
    watch: bool,

    /// Seconds between refreshes in watch mode
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Reset expand state on every refresh
    #[arg(long)]
    no_preserve: bool,

    #[arg(long, value_name = "MS")]
    start_timeout_ms: Option<u64>,

    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Config file (default: $IMMUTABLE_AUDITOR_CONFIG or the user config dir)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags take precedence over the config file
    fn apply_overrides(&self, mut config: AuditorConfig) -> Result<AuditorConfig> {
        if let Some(ms) = self.start_timeout_ms {
            config.timeouts.start_ms = ms;
        }
        if let Some(ms) = self.timeout_ms {
            config.timeouts.total_ms = ms;
        }
        if let Some(secs) = self.interval {
            config.view.watch_interval_secs = secs;
        }
        if self.no_preserve {
            config.view.preserve_expanded = false;
        }
        config.validate().context("Invalid command-line options")?;
        Ok(config)
    }

    /// Initial expand state requested on the command line
    fn apply_view_options(&self, view: &mut AuditorView) {
        if self.all {
            view.store_mut().expand_all();
        }
        for path in &self.collapse {
            if !view.store_mut().set_expanded(path, false) {
                warn!("No expandable node at {}", path);
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("immutable_auditor=debug,auditor_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run one build on the blocking pool and ingest it
async fn refresh(view: &mut AuditorView) -> Result<Report> {
    view.begin_refresh();
    let builder = view.builder();
    let report = tokio::task::spawn_blocking(move || builder.build())
        .await
        .context("Report build task failed")?;
    view.apply(&report);
    Ok(report)
}

fn print_report(cli: &Cli, view: &AuditorView, report: &Report) -> Result<()> {
    if cli.json {
        let payload = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", payload);
    } else {
        print!("{}", render::render_view(view, cli.details));
        println!(
            "\nGenerated {} in {}ms",
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            report.duration_ms
        );
    }
    Ok(())
}

/// A build slower than `every` pushes the next tick back instead of bursting
fn watch_ticker(every: Duration) -> Interval {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Refresh on every tick until `shutdown` resolves, even in the middle of a build.
/// Returns the number of reports printed.
async fn watch_until(
    cli: &Cli,
    view: &mut AuditorView,
    every: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<u64> {
    let mut ticker = watch_ticker(every);
    tokio::pin!(shutdown);
    let mut generation = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }

        let report = tokio::select! {
            report = refresh(view) => report?,
            _ = &mut shutdown => {
                info!("Build of refresh #{} abandoned", generation);
                break;
            }
        };

        if generation == 0 {
            cli.apply_view_options(view);
        } else if !cli.json {
            println!("\n──────── refresh #{} ────────", generation);
        }
        print_report(cli, view, &report)?;
        generation += 1;
    }
    Ok(generation)
}

async fn watch(cli: &Cli, view: &mut AuditorView, every: Duration) -> Result<()> {
    info!("Watching every {}s, Ctrl-C to stop", every.as_secs());
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    let printed = watch_until(cli, view, every, ctrl_c).await?;
    info!("Interrupted after {} reports, stopping watch", printed);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AuditorConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    let config = cli.apply_overrides(config)?;

    if cli.write_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => AuditorConfig::config_file_path()?,
        };
        config.save(&path).await.context("Failed to save configuration")?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let builder = Arc::new(ReportBuilder::new(SystemRunner, config.process_timeouts()));
    let mut view = AuditorView::new(builder);
    view.set_preserve_expanded(config.view.preserve_expanded);

    if cli.watch {
        watch(&cli, &mut view, Duration::from_secs(config.view.watch_interval_secs)).await
    } else {
        let report = refresh(&mut view).await?;
        cli.apply_view_options(&mut view);
        print_report(&cli, &view, &report)
    }
}
