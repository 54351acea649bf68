use rand::Rng;

use crate::types::{FinishPlacing, RaceEntry, Round, RoundResult, FINISH_LINE, PROGRESS_PER_TICK};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RacePhase {
  Idle,
  Running,
  Complete,
}

#[derive(Clone, Copy, Debug)]
struct LedgerEntry {
  entry_index: usize,
  tick: u64,
  finished_at_ms: u64,
}

/// Runs a single round. One simulator per round; it is dropped once the
/// result has been taken.
#[derive(Debug)]
pub struct RoundSimulator {
  round: u32,
  distance: u32,
  entries: Vec<RaceEntry>,
  ledger: Vec<LedgerEntry>,
  ticks: u64,
  phase: RacePhase,
}

impl RoundSimulator {
  pub fn new(round: &Round) -> Self {
    RoundSimulator {
      round: round.round,
      distance: round.distance,
      entries: round.entrants.iter().cloned().map(RaceEntry::new).collect(),
      ledger: Vec::with_capacity(round.entrants.len()),
      ticks: 0,
      phase: RacePhase::Idle,
    }
  }

  pub fn start(&mut self) {
    if self.phase == RacePhase::Idle {
      self.phase = RacePhase::Running;
    }
  }

  pub fn phase(&self) -> RacePhase {
    self.phase
  }

  pub fn round(&self) -> u32 {
    self.round
  }

  pub fn distance(&self) -> u32 {
    self.distance
  }

  pub fn ticks(&self) -> u64 {
    self.ticks
  }

  pub fn entries(&self) -> &[RaceEntry] {
    &self.entries
  }

  /// Advance every unfinished entrant by one step. Returns `true` once all
  /// entrants have crossed the line.
  ///
  /// Entrants are visited in round order, so entrants finishing on the same
  /// tick are ranked by their position in the round.
  pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R, now_ms: u64) -> bool {
    if self.phase != RacePhase::Running {
      return self.phase == RacePhase::Complete;
    }
    self.ticks += 1;

    for (idx, entry) in self.entries.iter_mut().enumerate() {
      if entry.is_finished() {
        continue;
      }
      let speed = speed_factor(entry.competitor.condition, &mut *rng);
      entry.speed = speed;
      entry.progress = (entry.progress + speed * PROGRESS_PER_TICK).min(FINISH_LINE);
      if entry.is_finished() && entry.finish_rank.is_none() {
        self.ledger.push(LedgerEntry {
          entry_index: idx,
          tick: self.ticks,
          finished_at_ms: now_ms,
        });
        entry.finish_rank = Some(self.ledger.len() as u32);
      }
    }

    if self.entries.iter().all(RaceEntry::is_finished) {
      self.phase = RacePhase::Complete;
    }
    self.phase == RacePhase::Complete
  }

  /// Finish order of a completed round; `None` while the round is still running.
  pub fn result(&self) -> Option<RoundResult> {
    if self.phase != RacePhase::Complete {
      return None;
    }
    let finish_order = self
      .ledger
      .iter()
      .enumerate()
      .map(|(idx, ledger)| FinishPlacing {
        rank: idx as u32 + 1,
        competitor: self.entries[ledger.entry_index].competitor.clone(),
        tick: ledger.tick,
        finished_at_ms: ledger.finished_at_ms,
      })
      .collect();
    Some(RoundResult {
      round: self.round,
      distance: self.distance,
      finish_order,
    })
  }
}

/// Per-tick pace: condition scaled by a fresh draw from `[0.5, 1.0)`.
pub fn speed_factor<R: Rng + ?Sized>(condition: u8, rng: &mut R) -> f64 {
  (condition as f64 / 100.0) * rng.gen_range(0.5..1.0)
}
