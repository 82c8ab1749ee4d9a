//! Marketscrape CLI - Entry Point
//!
//! Runs one search or sold-listings query and prints the records as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use marketscrape::config::LogConfig;
use marketscrape::scrape::HttpFetcher;
use marketscrape::{
    Config, ListingRecord, Platform, ProxyEvent, ProxyRotator, RateLimiter, ScrapeEngine,
    ScrapeError, SearchOptions,
};

#[derive(Parser)]
#[command(name = "marketscrape", version, about = "Scrape trading card marketplace listings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search active listings
    Search {
        /// ebay, tcgplayer or cardmarket
        platform: String,
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Search sold listings
    Sold {
        platform: String,
        query: String,
        /// Only keep sales from the last N days
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(&config.log);

    let limiter = RateLimiter::from_config(&config.scrape);
    let rotator = Arc::new(ProxyRotator::from_config(&config.proxy)?);
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
        config.scrape.connect_timeout,
    ))?);
    info!(
        "Loaded {} proxies (proxying {})",
        rotator.count(),
        if rotator.is_enabled() { "enabled" } else { "disabled" }
    );

    let event_task = tokio::spawn(log_proxy_events(rotator.clone(), fetcher.clone()));
    let engine = ScrapeEngine::new(&config.scrape, limiter.clone(), rotator, fetcher);

    let listings = tokio::select! {
        result = run(&engine, cli.command) => result?,
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            limiter.close();
            event_task.abort();
            return Ok(());
        }
    };

    event_task.abort();
    println!("{}", serde_json::to_string_pretty(&listings)?);
    Ok(())
}

async fn run(engine: &ScrapeEngine, command: Command) -> anyhow::Result<Vec<ListingRecord>> {
    let listings = match command {
        Command::Search {
            platform,
            query,
            category,
            page,
        } => {
            let platform = parse_platform(&platform)?;
            let options = SearchOptions { category, page };
            engine.search(platform, &query, &options).await?
        }
        Command::Sold {
            platform,
            query,
            days,
        } => {
            let platform = parse_platform(&platform)?;
            engine.completed_sales(platform, &query, days).await?
        }
    };

    info!("Found {} listings", listings.len());
    Ok(listings)
}

fn parse_platform(raw: &str) -> Result<Platform, ScrapeError> {
    Platform::from_str(raw).ok_or_else(|| ScrapeError::UnknownPlatform(raw.to_string()))
}

fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("marketscrape={}", config.level).into());

    // Logs go to stderr so stdout stays pure JSON
    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Log pool changes and drop cached clients for removed proxies
async fn log_proxy_events(rotator: Arc<ProxyRotator>, fetcher: Arc<HttpFetcher>) {
    let mut events = rotator.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => {
                let id = event.identity().map(|p| p.id.as_str()).unwrap_or("none");
                info!(kind = event.name(), proxy = id, "Proxy pool event");
                if let ProxyEvent::Removed(identity) = &event {
                    fetcher.evict(&identity.id);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Proxy event observer lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => {
                debug!("Proxy event channel closed");
                break;
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
