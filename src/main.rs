//! nodepulse: terminal dashboard for Kubernetes nodes and their pods

use clap::Parser;
use color_eyre::Result;
use nodepulse_core::constants::{DEFAULT_CHANGE_LOG_SIZE, refresh_intervals};
use nodepulse_core::{FilterCriteria, RefreshConfig};
use nodepulse_kube::{KubeSource, MockSource};
use nodepulse_tui::App;
use nodepulse_tui::app::AppOptions;
use std::fs::File;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

/// nodepulse: watch nodes, pod health and cluster changes from the terminal
#[derive(Parser, Debug)]
#[command(name = "nodepulse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Namespaces to show; comma-separated and repeatable, prefix with '-' to exclude
    #[arg(short = 'N', long = "namespace", allow_hyphen_values = true)]
    namespaces: Vec<String>,

    /// Use a generated cluster instead of a kubeconfig
    #[arg(long)]
    mock: bool,

    /// Seed for the generated cluster, for reproducible runs
    #[arg(long, requires = "mock")]
    mock_seed: Option<u64>,

    /// Kubeconfig context to use (default: current context)
    #[arg(long)]
    context: Option<String>,

    /// Seconds between scheduled refreshes
    #[arg(
        long,
        env = "NODEPULSE_POLL_INTERVAL",
        default_value_t = refresh_intervals::POLL
    )]
    poll_interval: u64,

    /// Seconds before a fetch is abandoned
    #[arg(
        long,
        env = "NODEPULSE_FETCH_TIMEOUT",
        default_value_t = refresh_intervals::FETCH_TIMEOUT
    )]
    fetch_timeout: u64,

    /// Seconds between retries while the cluster is unreachable
    #[arg(
        long,
        env = "NODEPULSE_RETRY_INTERVAL",
        default_value_t = refresh_intervals::RETRY
    )]
    retry_interval: u64,

    /// Append every detected change to this file
    #[arg(long)]
    change_log: Option<PathBuf>,

    /// Number of changes kept in the change log pane
    #[arg(long, default_value_t = DEFAULT_CHANGE_LOG_SIZE)]
    change_log_size: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log file path
    #[arg(long, default_value = "/tmp/nodepulse.log")]
    log_file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    color_eyre::install()?;

    // Log to a file; stdout belongs to the TUI
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let log_file = File::create(&cli.log_file)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(true)
                .with_target(false),
        )
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let refresh =
        RefreshConfig::from_secs(cli.poll_interval, cli.fetch_timeout, cli.retry_interval)?;
    let criteria = FilterCriteria::from_namespace_args(&cli.namespaces);
    tracing::info!(
        include = ?criteria.include_namespaces,
        exclude = ?criteria.exclude_namespaces,
        "Starting nodepulse"
    );

    let options = AppOptions {
        refresh,
        criteria,
        change_log_size: cli.change_log_size,
        journal: cli.change_log,
    };

    let mut app = if cli.mock {
        tracing::info!(seed = ?cli.mock_seed, "Using mock cluster");
        let source = match cli.mock_seed {
            Some(seed) => MockSource::with_seed(seed),
            None => MockSource::new(),
        };
        App::new(source, options)
    } else {
        if let Some(ctx) = &cli.context {
            tracing::info!("Using context: {}", ctx);
        }
        let source = KubeSource::connect(cli.context.as_deref()).await?;
        App::new(source, options)
    };
    app.run().await?;

    tracing::info!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_args_accept_exclusions() {
        let cli = Cli::parse_from(["nodepulse", "-N", "-kube-system", "-N", "default,ops"]);
        let criteria = FilterCriteria::from_namespace_args(&cli.namespaces);
        assert!(criteria.exclude_namespaces.contains("kube-system"));
        assert_eq!(criteria.include_namespaces.len(), 2);
    }

    #[test]
    fn test_interval_defaults() {
        let cli = Cli::parse_from(["nodepulse", "--mock"]);
        assert!(cli.mock);
        assert_eq!(cli.poll_interval, 10);
        assert_eq!(cli.retry_interval, 5);
        assert_eq!(cli.change_log_size, 20);
        assert_eq!(cli.mock_seed, None);
    }

    #[test]
    fn test_mock_seed_requires_mock() {
        let cli = Cli::parse_from(["nodepulse", "--mock", "--mock-seed", "42"]);
        assert_eq!(cli.mock_seed, Some(42));
        assert!(Cli::try_parse_from(["nodepulse", "--mock-seed", "42"]).is_err());
    }
}
