//! PatchKV - An In-Memory JSON Document Store
//!
//! This is the main entry point for the PatchKV console. It sets up logging,
//! the document store and the expiry sweeper, then reads commands from stdin
//! or a script file until end of input, `QUIT` or Ctrl+C.

use anyhow::Context;
use clap::Parser;
use patchkv::commands::CommandHandler;
use patchkv::console::{Console, ConsoleStats};
use patchkv::ranking::Leaderboards;
use patchkv::storage::{DocumentStore, ExpiryConfig, ExpirySweeper};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Console configuration
#[derive(Parser, Debug)]
#[command(
    name = "patchkv",
    about = "In-memory JSON document store with atomic partial updates",
    version
)]
struct Config {
    /// Starting interval of the expiry sweeper, in milliseconds
    #[arg(long, default_value_t = 100)]
    sweep_interval_ms: u64,

    /// Fastest sweeper interval, in milliseconds
    #[arg(long, default_value_t = 10)]
    sweep_min_ms: u64,

    /// Slowest sweeper interval, in milliseconds
    #[arg(long, default_value_t = 1000)]
    sweep_max_ms: u64,

    /// Only reclaim expired keys lazily, on access
    #[arg(long)]
    no_sweeper: bool,

    /// Log filter, e.g. `debug` or `patchkv::storage=trace` (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log: String,

    /// Read commands from a file instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,

    /// Do not print the banner
    #[arg(short, long)]
    quiet: bool,
}

impl Config {
    fn expiry(&self) -> ExpiryConfig {
        ExpiryConfig {
            base_interval: Duration::from_millis(self.sweep_interval_ms),
            min_interval: Duration::from_millis(self.sweep_min_ms),
            max_interval: Duration::from_millis(self.sweep_max_ms),
            ..ExpiryConfig::default()
        }
    }

    fn source(&self) -> String {
        match &self.script {
            Some(path) => path.display().to_string(),
            None => "stdin".to_string(),
        }
    }
}

fn print_banner(config: &Config) {
    eprintln!(
        r#"
   ___       _       _     _  ____   __
  / _ \__ _ | |_ ___| |__ | |/ /\ \ / /
 / /_)/ _` || __/ __| '_ \| ' /  \ V /
/ ___/ (_| || || (__| | | | . \   | |
\/    \__,_| \__\___|_| |_|_|\_\  |_|

PatchKV v{} - In-Memory JSON Document Store
──────────────────────────────────────────────────
Reading commands from {}
Type QUIT or press Ctrl+C to exit.
"#,
        patchkv::VERSION,
        config.source()
    );
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Logs go to stderr so replies on stdout stay clean.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log))
        .with_context(|| format!("invalid log filter '{}'", config.log))?;
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    if !config.quiet {
        print_banner(&config);
    }

    // The stdin reader blocks a runtime thread, so shut down without waiting on it.
    let runtime = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;
    let result = runtime.block_on(serve(config));
    runtime.shutdown_background();
    result
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(DocumentStore::new());
    let boards = Arc::new(Leaderboards::new());
    info!(shards = patchkv::storage::NUM_SHARDS, "Document store initialized");

    let _sweeper = if config.no_sweeper {
        info!("Expiry sweeper disabled, expired keys are reclaimed on access");
        None
    } else {
        Some(ExpirySweeper::start(Arc::clone(&store), config.expiry()))
    };

    let handler = CommandHandler::new(store, boards);

    let session = async {
        match &config.script {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open script {}", path.display()))?;
                run_console(BufReader::new(file), handler).await
            }
            None => run_console(BufReader::new(tokio::io::stdin()), handler).await,
        }
    };

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping...");
    };

    tokio::select! {
        result = session => {
            let stats = result?;
            info!(
                lines = stats.lines_read,
                commands = stats.commands_processed,
                errors = stats.errors,
                "Input finished"
            );
        }
        _ = shutdown => {}
    }

    info!("Shutdown complete");
    Ok(())
}

async fn run_console<R>(reader: R, handler: CommandHandler) -> anyhow::Result<ConsoleStats>
where
    R: AsyncBufRead + Unpin,
{
    let stats = Console::new(reader, tokio::io::stdout(), handler)
        .run()
        .await
        .context("console session failed")?;
    Ok(stats)
}
