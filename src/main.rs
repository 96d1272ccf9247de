use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use turnstile::config::TurnstileConfig;
use turnstile::filter::{FilterAction, RequestFilter};
use turnstile::ratelimit::Admission;

/// Per-host request admission control.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate a configuration file
    Check {
        /// Configuration file (YAML, JSON or TOML)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Filter one Host value per input line and print each action as JSON
    Replay {
        /// Configuration file (YAML, JSON or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// File of keys, one per line; stdin when omitted. An empty line is
        /// a request without a Host header.
        #[arg(short, long)]
        keys: Option<PathBuf>,
    },
}

/// One line of replay output.
#[derive(Debug, Serialize)]
struct ReplayRecord<'a> {
    key: Option<&'a str>,
    action: FilterAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Check { config } => check(&config),
        Command::Replay { config, keys } => replay(&config, keys.as_deref()).await,
    }
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load(path: &Path) -> anyhow::Result<(TurnstileConfig, Admission)> {
    let config = TurnstileConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    let admission = config.build().context("invalid configuration")?;
    Ok((config, admission))
}

fn check(path: &Path) -> anyhow::Result<()> {
    let (config, admission) = load(path)?;

    info!(
        qps = ?config.qps,
        literal_rules = admission.whitelist().literal_count(),
        pattern_rules = admission.whitelist().pattern_count(),
        show_limit_quota_header = config.show_limit_quota_header,
        rejected_code = config.rejected_code,
        "Configuration is valid"
    );
    println!("{}: ok", path.display());
    Ok(())
}

async fn replay(path: &Path, keys: Option<&Path>) -> anyhow::Result<()> {
    let (config, admission) = load(path)?;
    let filter = RequestFilter::new(Arc::new(admission), config.response_settings());

    let input: Box<dyn AsyncRead + Unpin + Send> = match keys {
        Some(keys) => Box::new(
            tokio::fs::File::open(keys)
                .await
                .with_context(|| format!("failed to open {}", keys.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(input).lines();

    let sweeper = filter.admission().spawn_sweeper();
    if sweeper.is_some() {
        info!("Idle bucket sweeper running");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let (mut admitted, mut rejected, mut exempt) = (0u64, 0u64, 0u64);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => line.context("failed to read keys")?,
        };
        let Some(line) = line else { break };

        let line = line.trim_end_matches('\r');
        let key = (!line.is_empty()).then_some(line);
        let action = filter.on_request_headers(key);

        match &action {
            FilterAction::Continue { context: None } => exempt += 1,
            FilterAction::Continue { context: Some(_) } => admitted += 1,
            FilterAction::Reject(_) => rejected += 1,
        }

        let record = ReplayRecord {
            key,
            reset: action.quota().map(|q| render_reset(q.reset_at)),
            action,
        };
        println!("{}", serde_json::to_string(&record)?);
    }

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }

    info!(
        admitted,
        rejected,
        exempt,
        tracked_keys = filter.admission().tracked_keys(),
        "Replay finished"
    );
    Ok(())
}

/// Render a reset instant (Unix nanoseconds) as RFC 3339.
fn render_reset(reset_at: u64) -> String {
    match i64::try_from(reset_at) {
        Ok(nanos) => Utc.timestamp_nanos(nanos).to_rfc3339(),
        Err(_) => {
            warn!(reset_at, "Reset instant out of range");
            reset_at.to_string()
        }
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping replay");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping replay");
        }
    }
}
