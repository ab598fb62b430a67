//! Bus Times - voice assistant skill backend
//!
//! Answers "when is the next bus" questions from a voice platform webhook by
//! querying the TransLoc arrival-estimates API.
//!
//! Module structure:
//! - `domain/` - Core types (codes, arrival estimates, speech responses, errors)
//! - `io/` - External interfaces (webhook server, TransLoc client)
//! - `services/` - Skill logic (router, directory, handler)
//! - `infra/` - Infrastructure (config, metrics)

use bus_times::infra::{Config, Metrics};
use bus_times::io::{start_skill_server, TranslocClient};
use bus_times::services::{Skill, TransitDirectory};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Bus Times - next bus arrival skill backend
#[derive(Parser, Debug)]
#[command(name = "bus-times", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, LOG_FORMAT=json for log shippers
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(git_hash = %env!("GIT_HASH"), "bus-times starting");

    let args = Args::parse();
    let config_path = Config::resolve_config_path(args.config);
    let config = Config::load_from_path(&config_path);

    let directory = Arc::new(TransitDirectory::from_config(&config));
    info!(
        config_file = %config.config_file(),
        bind_address = %config.bind_address(),
        port = %config.port(),
        transloc_base_url = %config.transloc_base_url(),
        transloc_agency = %config.transloc_agency(),
        api_key_configured = %config.transloc_api_key().is_some(),
        stops = ?config.stops().keys().collect::<Vec<_>>(),
        routes = ?config.routes().keys().collect::<Vec<_>>(),
        "config_loaded"
    );
    if directory.route_count() == 0 {
        warn!(hint = "set [routes] or BUS_ROUTE_<NAME>", "no_routes_configured");
    }

    let addr: SocketAddr = format!("{}:{}", config.bind_address(), config.port()).parse()?;
    let client = TranslocClient::new(&config)?;
    let metrics = Arc::new(Metrics::new());
    let skill = Arc::new(Skill::new(
        directory,
        client,
        config.unavailable_message(),
        metrics.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Periodic metrics summary
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    start_skill_server(addr, skill, shutdown_rx).await?;

    info!("bus-times shutdown complete");
    Ok(())
}
