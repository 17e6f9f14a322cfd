// Points curve for demon completions.
//
// A demon's base value depends only on its rank (1-based catalog position).
// Partial runs of at least 51% earn a quarter of it; anything below earns nothing.

/// Points awarded for the #1 demon.
pub const MAX_POINTS: i64 = 1000;
/// Demons ranked 1..=TOP_TIER_SIZE decay from MAX_POINTS towards TOP_TIER_FLOOR.
pub const TOP_TIER_SIZE: i64 = 50;
pub const TOP_TIER_FLOOR: i64 = 300;
/// Floor for every demon past the top tier.
pub const MIN_POINTS: i64 = 5;

const TOP_TIER_STEP: i64 = 20;
const TAIL_STEP: i64 = 5;

/// Lowest progress that still counts as a completion.
pub const QUALIFYING_PROGRESS: i64 = 51;
/// Progress of a full completion.
pub const FULL_PROGRESS: i64 = 100;

/// Base points for a demon at `rank` (1-based).
pub fn points_for_rank(rank: usize) -> i64 {
    let rank = rank as i64;
    if rank <= TOP_TIER_SIZE {
        (MAX_POINTS - (rank - 1) * TOP_TIER_STEP).max(TOP_TIER_FLOOR)
    } else {
        (TOP_TIER_FLOOR - (rank - (TOP_TIER_SIZE + 1)) * TAIL_STEP).max(MIN_POINTS)
    }
}

/// Points for a run of `progress` percent on the demon at `rank`.
pub fn scaled_points(rank: usize, progress: i64) -> i64 {
    let base = points_for_rank(rank);
    if progress == FULL_PROGRESS {
        base
    } else if progress >= QUALIFYING_PROGRESS {
        base / 4
    } else {
        0
    }
}

/// Whether `progress` puts a demon in a player's completed list.
pub fn is_qualifying(progress: i64) -> bool {
    progress >= QUALIFYING_PROGRESS
}
