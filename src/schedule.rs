use rand::{seq::SliceRandom, Rng};

use crate::error::TournamentError;
use crate::types::{CompetitorRef, Round, ENTRANTS_PER_ROUND, ROUND_DISTANCES};

/// Build one round per entry of `ROUND_DISTANCES`.
///
/// Every round draws its entrants independently from the whole roster, so a
/// competitor may run in several rounds or in none.
pub fn build_schedule<R: Rng + ?Sized>(
    roster: &[CompetitorRef],
    rng: &mut R,
) -> Result<Vec<Round>, TournamentError> {
    if roster.len() < ENTRANTS_PER_ROUND {
        return Err(TournamentError::InsufficientRoster {
            needed: ENTRANTS_PER_ROUND,
            available: roster.len(),
        });
    }

    let schedule = ROUND_DISTANCES
        .iter()
        .enumerate()
        .map(|(idx, &distance)| Round {
            round: idx as u32 + 1,
            distance,
            entrants: sample_entrants(roster, ENTRANTS_PER_ROUND, &mut *rng),
        })
        .collect();
    Ok(schedule)
}

fn sample_entrants<R: Rng + ?Sized>(
    roster: &[CompetitorRef],
    count: usize,
    rng: &mut R,
) -> Vec<CompetitorRef> {
    let mut pool = roster.to_vec();
    pool.shuffle(rng);
    pool.truncate(count);
    pool
}
