pub mod types;
pub mod config;
pub mod error;
pub mod roster;
pub mod schedule;
pub mod race;
pub mod tournament;
pub mod race_commands;

use config::*;
use types::EngineConfig;
use tournament::TournamentEngine;

use std::{fs, path::PathBuf};
use axum::{
    routing::{get, get_service, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── HTTP server ────────────────────────────────────────────────────────

pub fn race_router(engine: TournamentEngine, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/state.json", get(race_commands::get_state_json))
        .route(
            "/api/roster",
            get(race_commands::get_roster).post(race_commands::initialize_roster),
        )
        .route(
            "/api/schedule",
            get(race_commands::get_schedule).post(race_commands::generate_schedule),
        )
        .route("/api/results", get(race_commands::get_results))
        .route("/api/rounds/next", post(race_commands::start_next_round))
        .with_state(engine);

    match static_dir {
        Some(dir) => router.fallback_service(get_service(ServeDir::new(dir))),
        None => router,
    }
}

async fn start_race_server(engine: TournamentEngine, config: EngineConfig) -> Result<(), String> {
    let app = race_router(engine, static_dir_path(&config));
    let addr = config.bind_addr.as_str();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("race server failed to bind {addr}: {e}"))?;
    info!("race server listening at http://{addr}/");
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("race server error: {e}"))
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() -> Result<(), String> {
    load_env_file();
    let config = load_config_inner()?;

    // Initialize tracing with file output
    let logs_dir = log_dir_path(&config);
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "race_day.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!(
        tick_interval_ms = config.tick_interval_ms,
        seeded = config.seed.is_some(),
        "Race Day starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("build tokio runtime: {e}"))?;

    runtime.block_on(async move {
        let engine = TournamentEngine::new(&config);
        engine.initialize_roster();
        let result = start_race_server(engine, config).await;
        if let Err(e) = &result {
            error!("{e}");
        }
        result
    })
}
