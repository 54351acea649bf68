/// Errors surfaced by tournament operations.
///
/// Rejected round starts (no schedule, tournament finished, round already
/// racing) are not errors; `start_next_round` reports them as `None`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TournamentError {
    /// The roster cannot fill a round.
    #[error("roster has {available} competitors but each round needs {needed}")]
    InsufficientRoster { needed: usize, available: usize },
}
