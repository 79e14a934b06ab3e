mod advisory;
mod analytics;
mod api;
mod config;
mod error;
mod fetcher;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::advisory::AdvisoryClient;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::MarketFeed;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Data source ---
    let feed = MarketFeed::from_config(&cfg)?;
    match &cfg.feed_url {
        Some(url) => info!(
            "Live feed: {url} (consumption reported {}, converted to daily at ingestion)",
            cfg.consumption_unit
        ),
        None => warn!("FEED_URL not set, serving the static fallback table only."),
    }

    // --- Startup snapshot ---
    let startup = feed.load().await?;
    info!(
        origin = %startup.origin,
        regions = startup.rows.len(),
        "Startup snapshot: {} regions from {} source",
        startup.rows.len(),
        startup.origin,
    );

    // --- Advisory service ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    health.set_last_origin(startup.origin);

    let advisory = AdvisoryClient::from_config(&cfg, Arc::clone(&latency), Arc::clone(&health))?;
    if advisory.is_configured() {
        info!(
            "Advisory service: {} (model {}, timeout {}s)",
            cfg.advisory_url, cfg.advisory_model, cfg.advisory_timeout_secs
        );
    } else {
        warn!("ADVISORY_API_KEY not set, advisory questions will get the static fallback reply.");
    }

    info!(
        critical_runway_days = %cfg.alert_thresholds.critical_runway_days,
        warning_runway_days = %cfg.alert_thresholds.warning_runway_days,
        critical_spread = ?cfg.alert_thresholds.critical_spread,
        shortage_threshold = %cfg.scenario.shortage_threshold,
        projection_periods = cfg.scenario.projection_periods,
        "Thresholds loaded"
    );

    // --- HTTP API server ---
    let api_state = ApiState {
        feed: Arc::new(feed),
        advisory: Arc::new(advisory),
        health,
        latency,
        thresholds: cfg.alert_thresholds,
        scenario: cfg.scenario,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
