use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    runtime::Handle,
    sync::{broadcast, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::config::now_ms;
use crate::error::TournamentError;
use crate::race::RoundSimulator;
use crate::roster::generate_roster;
use crate::schedule::build_schedule;
use crate::types::*;

/// Everything a tournament session knows.
///
/// Observers get read-only projections; mutation goes through
/// [`TournamentEngine`].
pub struct TournamentState {
    roster: Vec<CompetitorRef>,
    schedule: Vec<Round>,
    results: Vec<RoundResult>,
    current_round: u32,
    is_racing: bool,
    active: Option<RoundSimulator>,
    active_task: Option<JoinHandle<()>>,
    /// Bumped on every schedule reset; tick tasks from an older epoch stop
    /// without touching state.
    epoch: u64,
    rng: StdRng,
}

impl TournamentState {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        TournamentState {
            roster: Vec::new(),
            schedule: Vec::new(),
            results: Vec::new(),
            current_round: 0,
            is_racing: false,
            active: None,
            active_task: None,
            epoch: 0,
            rng,
        }
    }

    pub fn roster(&self) -> &[CompetitorRef] {
        &self.roster
    }

    pub fn schedule(&self) -> &[Round] {
        &self.schedule
    }

    pub fn results(&self) -> &[RoundResult] {
        &self.results
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn has_schedule(&self) -> bool {
        !self.schedule.is_empty()
    }

    pub fn is_racing(&self) -> bool {
        self.is_racing
    }

    pub fn is_finished(&self) -> bool {
        self.has_schedule() && self.current_round as usize >= self.schedule.len() && !self.is_racing
    }

    /// Distance of the round currently shown, or 0 before the first start.
    pub fn current_distance(&self) -> u32 {
        if self.current_round == 0 {
            return 0;
        }
        self.schedule
            .get(self.current_round as usize - 1)
            .map(|round| round.distance)
            .unwrap_or(0)
    }

    pub fn live_entries(&self) -> Vec<RaceEntry> {
        self.active
            .as_ref()
            .map(|sim| sim.entries().to_vec())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> TournamentSnapshot {
        TournamentSnapshot {
            roster: self.roster.clone(),
            schedule: self.schedule.clone(),
            results: self.results.clone(),
            current_round: self.current_round,
            current_distance: self.current_distance(),
            is_game_started: self.has_schedule(),
            is_racing: self.is_racing,
            is_finished: self.is_finished(),
            live_entries: self.live_entries(),
        }
    }

    fn reset_progress(&mut self) {
        if let Some(task) = self.active_task.take() {
            task.abort();
        }
        self.epoch += 1;
        self.schedule.clear();
        self.results.clear();
        self.current_round = 0;
        self.is_racing = false;
        self.active = None;
    }

    /// Run one tick of the active round. Returns the result when this tick
    /// finished the round.
    fn advance_active_round(&mut self, now_ms: u64) -> Option<RoundResult> {
        let sim = self.active.as_mut()?;
        if !sim.tick(&mut self.rng, now_ms) {
            return None;
        }
        let result = sim.result()?;
        self.results.push(result.clone());
        self.active = None;
        self.active_task = None;
        self.is_racing = false;
        Some(result)
    }
}

/// Handle to a single tournament session. Cheap to clone.
#[derive(Clone)]
pub struct TournamentEngine {
    state: SharedTournament,
    events: broadcast::Sender<TournamentEvent>,
    tick_interval: Duration,
}

impl TournamentEngine {
    pub fn new(config: &EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        TournamentEngine {
            state: Arc::new(Mutex::new(TournamentState::new(config.seed))),
            events,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TournamentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TournamentEvent> {
        self.events.subscribe()
    }

    /// Call `f` with a read-only view of the state.
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TournamentState) -> R,
    {
        let guard = self.lock();
        f(&guard)
    }

    pub fn snapshot(&self) -> TournamentSnapshot {
        self.with_state(|state| state.snapshot())
    }

    /// Roll a fresh roster. An existing schedule keeps the competitors it
    /// was drawn from.
    pub fn initialize_roster(&self) -> Vec<CompetitorRef> {
        let roster = {
            let mut guard = self.lock();
            let roster = generate_roster(&mut guard.rng);
            guard.roster = roster.clone();
            roster
        };
        info!(size = roster.len(), "roster initialized");
        let _ = self.events.send(TournamentEvent::RosterInitialized { size: roster.len() });
        roster
    }

    /// Draw a new schedule and discard all tournament progress, including a
    /// round that is still running.
    pub fn generate_schedule(&self) -> Result<Vec<Round>, TournamentError> {
        let schedule = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let schedule = build_schedule(&state.roster, &mut state.rng)?;
            if state.is_racing {
                warn!(round = state.current_round, "schedule regenerated mid-round; stopping tick task");
            }
            state.reset_progress();
            state.schedule = schedule.clone();
            schedule
        };
        info!(rounds = schedule.len(), "schedule generated");
        let _ = self.events.send(TournamentEvent::ScheduleGenerated { rounds: schedule.len() });
        Ok(schedule)
    }

    /// Start the next scheduled round and return at once. The receiver
    /// yields the round's result when its last entrant finishes, and errors
    /// if the round is discarded by a schedule reset.
    ///
    /// Returns `None` without changing anything when there is no schedule,
    /// every round has run, a round is already racing, or no Tokio runtime is
    /// available to drive the ticks.
    pub fn start_next_round(&self) -> Option<oneshot::Receiver<RoundResult>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!("start_next_round called outside a Tokio runtime");
            return None;
        };

        let mut guard = self.lock();
        if guard.is_racing || guard.active.is_some() {
            debug!(round = guard.current_round, "round already racing; start ignored");
            return None;
        }
        if !guard.has_schedule() {
            debug!("no schedule; start ignored");
            return None;
        }
        if guard.current_round as usize >= guard.schedule.len() {
            debug!("tournament finished; start ignored");
            return None;
        }

        guard.current_round += 1;
        let round_index = guard.current_round as usize - 1;
        let mut sim = RoundSimulator::new(&guard.schedule[round_index]);
        sim.start();
        let (round, distance) = (sim.round(), sim.distance());
        guard.active = Some(sim);
        guard.is_racing = true;

        let (done_tx, done_rx) = oneshot::channel();
        let task = runtime.spawn(run_round_ticks(
            self.state.clone(),
            self.events.clone(),
            guard.epoch,
            self.tick_interval,
            done_tx,
        ));
        guard.active_task = Some(task);
        drop(guard);

        info!(round, distance, "round started");
        let _ = self.events.send(TournamentEvent::RoundStarted { round, distance });
        Some(done_rx)
    }

    pub fn current_round(&self) -> u32 {
        self.with_state(|state| state.current_round())
    }

    pub fn is_racing(&self) -> bool {
        self.with_state(|state| state.is_racing())
    }

    pub fn results(&self) -> Vec<RoundResult> {
        self.with_state(|state| state.results().to_vec())
    }
}

async fn run_round_ticks(
    state: SharedTournament,
    events: broadcast::Sender<TournamentEvent>,
    epoch: u64,
    interval: Duration,
    done: oneshot::Sender<RoundResult>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let finished = {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            if guard.epoch != epoch {
                warn!(epoch, current = guard.epoch, "stale round tick task discarded");
                return;
            }
            guard.advance_active_round(now_ms())
        };
        let Some(result) = finished else {
            continue;
        };

        let winner_id = result.winner().map(|competitor| competitor.id);
        info!(round = result.round, ?winner_id, "round finished");
        for placing in &result.finish_order {
            debug!(round = result.round, rank = placing.rank, id = placing.competitor.id, tick = placing.tick, "placing");
        }
        let _ = events.send(TournamentEvent::RoundFinished {
            round: result.round,
            winner_id,
        });
        let _ = done.send(result);
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_engine(seed: u64) -> TournamentEngine {
        TournamentEngine::new(&EngineConfig {
            seed: Some(seed),
            ..EngineConfig::default()
        })
    }

    fn ready_engine(seed: u64) -> TournamentEngine {
        let engine = test_engine(seed);
        engine.initialize_roster();
        engine.generate_schedule().unwrap();
        engine
    }

    #[test]
    fn test_initial_projections() {
        let engine = test_engine(1);
        let snapshot = engine.snapshot();

        assert!(snapshot.roster.is_empty());
        assert!(!snapshot.is_game_started);
        assert!(!snapshot.is_racing);
        assert!(!snapshot.is_finished);
        assert_eq!(snapshot.current_round, 0);
        assert_eq!(snapshot.current_distance, 0);
    }

    #[test]
    fn test_schedule_requires_roster() {
        let engine = test_engine(2);
        let err = engine.generate_schedule().unwrap_err();

        assert!(matches!(err, TournamentError::InsufficientRoster { available: 0, .. }));
        assert!(!engine.with_state(|state| state.has_schedule()));
    }

    #[test]
    fn test_reinitializing_roster_rerolls_same_ids() {
        let engine = test_engine(3);
        let first = engine.initialize_roster();
        let second = engine.initialize_roster();

        assert_eq!(second.len(), ROSTER_SIZE);
        let first_ids: Vec<u32> = first.iter().map(|c| c.id).collect();
        let second_ids: Vec<u32> = second.iter().map(|c| c.id).collect();
        assert_eq!(first_ids, second_ids);
        assert!(engine
            .with_state(|state| state.roster().iter().zip(&second).all(|(a, b)| Arc::ptr_eq(a, b))));
    }

    #[test]
    fn test_start_without_runtime_is_ignored() {
        let engine = ready_engine(4);

        assert!(engine.start_next_round().is_none());
        assert_eq!(engine.current_round(), 0);
        assert!(!engine.is_racing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_schedule_is_ignored() {
        let engine = test_engine(5);
        engine.initialize_roster();

        assert!(engine.start_next_round().is_none());
        assert_eq!(engine.current_round(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_marks_round_running() {
        let engine = ready_engine(6);
        let done = engine.start_next_round().unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current_round, 1);
        assert_eq!(snapshot.current_distance, 1200);
        assert!(snapshot.is_racing);
        assert_eq!(snapshot.live_entries.len(), ENTRANTS_PER_ROUND);
        assert!(snapshot.live_entries.iter().all(|e| e.progress == 0.0));

        done.await.unwrap();
        assert!(!engine.is_racing());
        assert!(engine.snapshot().live_entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_progress_stays_within_bounds() {
        let engine = ready_engine(7);
        let mut done = engine.start_next_round().unwrap();

        let mut observed_progress = false;
        loop {
            tokio::time::sleep(Duration::from_millis(DEFAULT_TICK_INTERVAL_MS)).await;
            if let Ok(result) = done.try_recv() {
                assert_eq!(result.finish_order.len(), ENTRANTS_PER_ROUND);
                break;
            }
            for entry in engine.snapshot().live_entries {
                assert!(entry.progress >= 0.0 && entry.progress <= FINISH_LINE);
                observed_progress |= entry.progress > 0.0;
            }
        }
        assert!(observed_progress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_racing_is_ignored() {
        let engine = ready_engine(8);
        let done = engine.start_next_round().unwrap();

        assert!(engine.start_next_round().is_none());
        assert_eq!(engine.current_round(), 1);

        done.await.unwrap();
        assert_eq!(engine.results().len(), 1);
        assert_eq!(engine.current_round(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_tournament_runs_six_rounds() {
        let engine = ready_engine(9);
        let mut events = engine.subscribe();

        for expected_round in 1..=ROUND_DISTANCES.len() as u32 {
            let done = engine.start_next_round().unwrap();
            let result = done.await.unwrap();
            assert_eq!(result.round, expected_round);
            assert_eq!(result.distance, ROUND_DISTANCES[expected_round as usize - 1]);

            let ranks: Vec<u32> = result.finish_order.iter().map(|p| p.rank).collect();
            assert_eq!(ranks, (1..=ENTRANTS_PER_ROUND as u32).collect::<Vec<_>>());
            let ids: HashSet<u32> = result.finish_order.iter().map(|p| p.competitor.id).collect();
            let scheduled: HashSet<u32> = engine.with_state(|state| {
                state.schedule()[expected_round as usize - 1]
                    .entrants
                    .iter()
                    .map(|c| c.id)
                    .collect()
            });
            assert_eq!(ids, scheduled);
        }

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.results.len(), 6);
        assert_eq!(snapshot.current_round, 6);
        assert!(snapshot.is_finished);
        assert!(snapshot.results.iter().all(|r| r.finish_order.len() == ENTRANTS_PER_ROUND));

        assert!(engine.start_next_round().is_none());
        assert_eq!(engine.results().len(), 6);

        let mut finished = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, TournamentEvent::RoundFinished { .. }) {
                finished += 1;
            }
        }
        assert_eq!(finished, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_after_rounds_resets_progress() {
        let engine = ready_engine(10);
        for _ in 0..2 {
            engine.start_next_round().unwrap().await.unwrap();
        }
        assert_eq!(engine.results().len(), 2);

        engine.generate_schedule().unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current_round, 0);
        assert!(snapshot.results.is_empty());
        assert_eq!(snapshot.schedule.len(), 6);
        assert!(!snapshot.is_finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_mid_round_stops_old_ticks() {
        let engine = ready_engine(11);
        let done = engine.start_next_round().unwrap();

        tokio::time::sleep(Duration::from_millis(DEFAULT_TICK_INTERVAL_MS * 4 + 10)).await;
        assert!(engine.is_racing());
        assert!(engine.snapshot().live_entries.iter().any(|e| e.progress > 0.0));

        engine.generate_schedule().unwrap();
        let snapshot = engine.snapshot();
        assert!(!snapshot.is_racing);
        assert!(snapshot.results.is_empty());
        assert!(snapshot.live_entries.is_empty());
        assert_eq!(snapshot.current_round, 0);

        assert!(done.await.is_err());

        tokio::time::sleep(Duration::from_secs(60)).await;
        let snapshot = engine.snapshot();
        assert!(snapshot.results.is_empty());
        assert_eq!(snapshot.current_round, 0);
        assert!(!snapshot.is_racing);

        let result = engine.start_next_round().unwrap().await.unwrap();
        assert_eq!(result.round, 1);
        assert_eq!(engine.results().len(), 1);
    }
}
