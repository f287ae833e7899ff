//! Pairwise Elo rating engine used by match settlement.

/// XP granted to every finisher.
const BASE_XP: u32 = 50;
/// Extra XP per place above fourth.
const PLACEMENT_XP_STEP: i64 = 10;
const PLACEMENT_XP_CUTOFF: i64 = 4;

/// K-factor for a rating tier: volatile below 2000, steadier above.
pub fn k_factor(rating: i32) -> f64 {
    if rating < 2000 {
        32.0
    } else if rating < 2400 {
        24.0
    } else {
        16.0
    }
}

/// Probability that a player rated `rating` beats one rated `opponent`.
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - rating) / 400.0))
}

/// Ratings of `(winner, loser)` after one head-to-head result.
pub fn calculate_new_ratings(winner: i32, loser: i32) -> (i32, i32) {
    let new_winner =
        f64::from(winner) + k_factor(winner) * (1.0 - expected_score(winner, loser));
    let new_loser = f64::from(loser) + k_factor(loser) * (0.0 - expected_score(loser, winner));
    (round_half_up(new_winner), round_half_up(new_loser))
}

/// Rating change of a player against one opponent.
pub fn pairwise_delta(rating: i32, opponent: i32, won: bool) -> i32 {
    if won {
        calculate_new_ratings(rating, opponent).0 - rating
    } else {
        calculate_new_ratings(opponent, rating).1 - rating
    }
}

/// Average rating change of the finisher at `index` against every other finisher.
///
/// `field` holds `(rank, rating)` for all finishers. Each result is computed from pre-match
/// ratings, so the deltas of one match do not necessarily sum to zero.
pub fn averaged_delta(field: &[(u32, i32)], index: usize) -> i32 {
    let Some(&(rank, rating)) = field.get(index) else {
        return 0;
    };
    let total: i32 = field
        .iter()
        .enumerate()
        .filter(|(other, _)| *other != index)
        .map(|(_, &(other_rank, other_rating))| {
            pairwise_delta(rating, other_rating, rank < other_rank)
        })
        .sum();
    let opponents = field.len().saturating_sub(1).max(1);
    round_half_up(f64::from(total) / opponents as f64)
}

/// XP earned for finishing at `rank` (1-based).
pub fn xp_award(rank: u32) -> u32 {
    let bonus = ((PLACEMENT_XP_CUTOFF - i64::from(rank)) * PLACEMENT_XP_STEP).max(0);
    BASE_XP + bonus as u32
}

/// Round to the nearest integer, halves towards positive infinity.
fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}
