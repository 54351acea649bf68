use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::tournament::TournamentEngine;
use crate::types::{CompetitorRef, Round, RoundResult, StartRoundResponse};

// ── Queries ─────────────────────────────────────────────────────────────

/// Full snapshot for polling clients. Never cached.
pub async fn get_state_json(State(engine): State<TournamentEngine>) -> impl IntoResponse {
    let snapshot = engine.snapshot();
    let body = serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string());
    (
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
            ("Expires", "0"),
        ],
        body,
    )
}

pub async fn get_roster(State(engine): State<TournamentEngine>) -> Json<Vec<CompetitorRef>> {
    Json(engine.with_state(|state| state.roster().to_vec()))
}

pub async fn get_schedule(State(engine): State<TournamentEngine>) -> Json<Vec<Round>> {
    Json(engine.with_state(|state| state.schedule().to_vec()))
}

pub async fn get_results(State(engine): State<TournamentEngine>) -> Json<Vec<RoundResult>> {
    Json(engine.results())
}

// ── Commands ────────────────────────────────────────────────────────────

pub async fn initialize_roster(State(engine): State<TournamentEngine>) -> Json<Vec<CompetitorRef>> {
    Json(engine.initialize_roster())
}

pub async fn generate_schedule(
    State(engine): State<TournamentEngine>,
) -> Result<Json<Vec<Round>>, (StatusCode, String)> {
    engine
        .generate_schedule()
        .map(Json)
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))
}

/// Kick off the next round. The round runs in the background; clients poll
/// `/state.json` for progress.
pub async fn start_next_round(State(engine): State<TournamentEngine>) -> Json<StartRoundResponse> {
    let started = engine.start_next_round().is_some();
    Json(StartRoundResponse {
        started,
        round: engine.current_round(),
    })
}
