use std::sync::Arc;

use rand::Rng;

use crate::types::{Competitor, CompetitorRef, COMPETITOR_COLORS, ROSTER_SIZE};

/// Build the full roster: ids `1..=ROSTER_SIZE`, colours assigned by
/// position, condition rolled uniformly in `[1, 100]` per competitor.
pub fn generate_roster<R: Rng + ?Sized>(rng: &mut R) -> Vec<CompetitorRef> {
    COMPETITOR_COLORS
        .iter()
        .take(ROSTER_SIZE)
        .enumerate()
        .map(|(idx, color)| {
            let id = idx as u32 + 1;
            Arc::new(Competitor {
                id,
                name: competitor_name(id),
                condition: rng.gen_range(1..=100),
                color: (*color).to_string(),
            })
        })
        .collect()
}

pub fn competitor_name(id: u32) -> String {
    format!("Horse {id}")
}
