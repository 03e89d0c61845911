//! aero-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, connects and
//! migrates the database, wires the collaborators and background jobs,
//! and starts the HTTP server. All route handlers live in `routes.rs`;
//! all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use aero_daemon::{routes, state};
use aero_engine::StateMachineService;
use aero_issuer_sim::{SimIssuer, SimPayments};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file
    // does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = Arc::new(aero_config::Config::load_from_env()?);
    info!(config_hash = %config.config_hash(), "configuration loaded");

    let pool = aero_db::connect_from_env().await?;
    aero_db::migrate(&pool).await?;

    // Simulated collaborators until real issuance/payments integrations
    // are wired; both sides of the seam are trait objects.
    let service = StateMachineService::new(
        pool.clone(),
        Arc::new(SimIssuer::new()),
        Arc::new(SimPayments::new()),
        Duration::from_secs(config.order_lease_secs),
    );

    let shared = Arc::new(state::AppState::new(
        pool.clone(),
        service.clone(),
        Arc::clone(&config),
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    aero_jobs::spawn_all(pool, service, Arc::clone(&config));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(&config)?;
    info!("aero-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Env var `AERO_DAEMON_ADDR` beats the config file.
fn bind_addr(config: &aero_config::Config) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = std::env::var("AERO_DAEMON_ADDR") {
        return addr
            .parse()
            .with_context(|| format!("invalid AERO_DAEMON_ADDR: {addr}"));
    }
    config
        .daemon_addr
        .parse()
        .with_context(|| format!("invalid daemon_addr in config: {}", config.daemon_addr))
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
