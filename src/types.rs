use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::tournament::TournamentState;

// ── Constants ──────────────────────────────────────────────────────────

pub const ROSTER_SIZE: usize = 20;
pub const ENTRANTS_PER_ROUND: usize = 10;
pub const ROUND_DISTANCES: [u32; 6] = [1200, 1400, 1600, 1800, 2000, 2200];
pub const FINISH_LINE: f64 = 100.0;
pub const PROGRESS_PER_TICK: f64 = 3.0;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

pub const COMPETITOR_COLORS: [&str; ROSTER_SIZE] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8",
    "#FFD93D", "#6BCF7F", "#C77DFF", "#FF8B94", "#A8E6CF",
    "#FFB6B9", "#8DD3C7", "#FEFFB3", "#BEB9DB", "#FDB462",
    "#80B1D3", "#FB8072", "#B3DE69", "#FCCDE5", "#BC80BD",
];

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedTournament = Arc<Mutex<TournamentState>>;
pub type CompetitorRef = Arc<Competitor>;

// ── Tournament domain types ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub id: u32,
    pub name: String,
    pub condition: u8,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round: u32,
    pub distance: u32,
    pub entrants: Vec<CompetitorRef>,
}

/// Live state of one entrant while its round is running.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceEntry {
    pub competitor: CompetitorRef,
    pub progress: f64,
    pub speed: f64,
    pub finish_rank: Option<u32>,
}

impl RaceEntry {
    pub fn new(competitor: CompetitorRef) -> Self {
        RaceEntry {
            competitor,
            progress: 0.0,
            speed: 0.0,
            finish_rank: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= FINISH_LINE
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishPlacing {
    pub rank: u32,
    pub competitor: CompetitorRef,
    pub tick: u64,
    pub finished_at_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub round: u32,
    pub distance: u32,
    pub finish_order: Vec<FinishPlacing>,
}

impl RoundResult {
    pub fn winner(&self) -> Option<&CompetitorRef> {
        self.finish_order.first().map(|placing| &placing.competitor)
    }
}

// ── Observer types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentSnapshot {
    pub roster: Vec<CompetitorRef>,
    pub schedule: Vec<Round>,
    pub results: Vec<RoundResult>,
    pub current_round: u32,
    pub current_distance: u32,
    pub is_game_started: bool,
    pub is_racing: bool,
    pub is_finished: bool,
    pub live_entries: Vec<RaceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TournamentEvent {
    RosterInitialized { size: usize },
    #[serde(rename_all = "camelCase")]
    ScheduleGenerated { rounds: usize },
    #[serde(rename_all = "camelCase")]
    RoundStarted { round: u32, distance: u32 },
    #[serde(rename_all = "camelCase")]
    RoundFinished { round: u32, winner_id: Option<u32> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRoundResponse {
    pub started: bool,
    pub round: u32,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub tick_interval_ms: u64,
    pub seed: Option<u64>,
    pub static_dir: String,
    pub log_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:17880".to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            seed: None,
            static_dir: String::new(),
            log_dir: "logs".to_string(),
        }
    }
}
