//! feedkeeper daemon.
//!
//! Wires the library together: load the config, open the JSON store, build
//! the HTTP fetcher, then either run the scheduler until Ctrl-C or perform a
//! single operation and exit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use feedkeeper::config::Config;
use feedkeeper::poll::{RefreshError, Refresher, Scheduler};
use feedkeeper::source::HttpFetcher;
use feedkeeper::store::{JsonStore, Store};

#[derive(Parser)]
#[command(
    name = "feedkeeper",
    version,
    about = "Periodically refresh subscribed RSS and Atom feeds"
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh eligible feeds on the configured interval until interrupted.
    Run,
    /// Refresh every eligible feed once and print the counts.
    Once,
    /// Reset a feed's failure state and refresh it now.
    Refresh { id: u64 },
    /// Subscribe to a feed.
    Add { url: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // -- configuration and logging ----------------------------------------------
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::defaults(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // -- collaborators ------------------------------------------------------------
    let store_path = &config.store.path;
    let store: Arc<dyn Store> = Arc::new(
        JsonStore::open(store_path)
            .await
            .with_context(|| format!("failed to open store {}", store_path.display()))?,
    );
    let fetcher = HttpFetcher::new(config.fetch_timeout(), &config.fetch.user_agent)
        .context("failed to build HTTP client")?;
    let refresher = Refresher::new(
        Arc::clone(&store),
        Arc::new(fetcher),
        config.refresh_settings(),
    );

    match cli.command {
        Command::Run => run(refresher, &config).await,
        Command::Once => {
            let stats = refresher.run_all().await;
            println!(
                "eligible {}  succeeded {}  failed {}  errored {}",
                stats.eligible, stats.succeeded, stats.failed, stats.errored
            );
            Ok(())
        }
        Command::Refresh { id } => match refresher.refresh(id).await {
            Ok(source) => {
                println!("{} [{}] {}", source.id, source.status, source.title);
                Ok(())
            }
            // The failure is already recorded on the source.
            Err(RefreshError::Fetch(e)) => {
                println!("{id} [{}] refresh failed: {e}", e.message);
                Ok(())
            }
            Err(e) => Err(e).context("refresh failed"),
        },
        Command::Add { url } => {
            let source = store.insert_source(&url, None).await?;
            println!("{} {}", source.id, source.url);
            Ok(())
        }
    }
}

/// Run the scheduler until Ctrl-C. The run in progress is allowed to finish.
async fn run(refresher: Refresher, config: &Config) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, finishing current run");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive so the scheduler is not stopped.
                tracing::warn!(error = %e, "cannot listen for interrupts");
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    tracing::info!(
        interval_secs = config.scheduler.interval_secs,
        "scheduler starting"
    );
    Scheduler::new(refresher, config.interval()).run(shutdown_rx).await;
    Ok(())
}
