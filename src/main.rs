// =============================================================================
// Stock Dashboard: Main Entry Point
// =============================================================================
//
// Serves the dashboard view model over HTTP. Every view is computed from the
// raw price data on request; nothing derived is cached between requests.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod dashboard;
mod engine;
mod error;
mod export;
mod indicators;
mod market_data;
mod runtime_config;
mod types;
mod view;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::YahooFinanceClient;
use crate::runtime_config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Stock Dashboard starting up");

    let config_path =
        std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard_config.json".into());

    let (mut config, loaded_from_file) = match ServiceConfig::load(&config_path) {
        Ok(cfg) => (cfg, true),
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            (ServiceConfig::default(), false)
        }
    };

    // Env overrides.
    if let Ok(addr) = std::env::var("DASHBOARD_BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(ticker) = std::env::var("DASHBOARD_TICKER") {
        let ticker = types::normalize_ticker(&ticker);
        if !ticker.is_empty() {
            config.defaults.ticker = ticker;
        }
    }

    info!(
        ticker = %config.defaults.ticker,
        window = %config.defaults.window,
        features = config.defaults.features.len(),
        "Dashboard defaults"
    );

    // ── 2. Market data client ────────────────────────────────────────────
    let source = YahooFinanceClient::new(
        &config.yahoo_base_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    info!(base_url = %config.yahoo_base_url, "Market data client initialised");

    // ── 3. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, Arc::new(source)));

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening. Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    // ── 5. Shutdown ──────────────────────────────────────────────────────
    // Write out a starter config on first run; never overwrite a user's file.
    if !loaded_from_file {
        if let Err(e) = state.config.save(&config_path) {
            error!(error = %e, "Failed to save service config on shutdown");
        }
    }

    info!(
        sessions = state.session_count(),
        renders = state.render_count(),
        "Stock Dashboard shut down complete"
    );
    Ok(())
}
