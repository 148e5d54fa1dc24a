mod catalog;
mod cleanup;
mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod rate_limiter;
mod routes;
mod state;
mod tts;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::Config, rate_limiter::RateLimiter, state::AppState, tts::TtsService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Arc::new(Config::from_env()?);
    let rate_limiter = Arc::new(RateLimiter::new(
        cfg.rate_limit_per_minute,
        cfg.rate_limit_burst,
    )?);
    info!(
        requests_per_minute = rate_limiter.requests_per_minute(),
        burst_limit = rate_limiter.burst_limit(),
        "rate limiter configured"
    );
    let sweeper = rate_limiter
        .clone()
        .start_sweeper(Duration::from_secs(cfg.rate_limit_sweep_secs));

    let tts = Arc::new(TtsService::new(&cfg)?);
    info!("writing audio to {}", tts.output_dir().display());

    let state = AppState {
        cfg: cfg.clone(),
        rate_limiter,
        tts,
    };
    let app = routes::router(state)?;

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
