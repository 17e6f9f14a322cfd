// Per-player totals and leaderboard ordering.
//
// Everything here works on a snapshot of the demon catalog passed in by the
// caller. A demon's rank is its 1-based position in that snapshot, so the same
// snapshot must be used for every player in one computation.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Demon, Player};
use crate::scoring::{points_for_rank, scaled_points};

/// Demon id -> (rank, demon) lookup over one catalog snapshot.
pub struct RankTable<'a> {
    by_id: HashMap<&'a str, (usize, &'a Demon)>,
}

impl<'a> RankTable<'a> {
    pub fn new(demons: &'a [Demon]) -> Self {
        let mut by_id = HashMap::with_capacity(demons.len());
        for (i, demon) in demons.iter().enumerate() {
            // First occurrence wins if an id is ever duplicated
            by_id.entry(demon.id.as_str()).or_insert((i + 1, demon));
        }
        Self { by_id }
    }

    pub fn get(&self, demon_id: &str) -> Option<(usize, &'a Demon)> {
        self.by_id.get(demon_id).copied()
    }
}

/// One scored entry of a player's completed list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub demon: Demon,
    pub rank: usize,
    pub points: i64,
    pub progress: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerTotals {
    pub total_points: i64,
    /// Highest points first; ties keep `completed_demons` order.
    pub completions: Vec<Completion>,
}

/// Summary shown on a player's detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub total_points: i64,
    pub completed_count: usize,
    pub hardest_demon: Option<Completion>,
    pub average_rank: f64,
    pub completions: Vec<Completion>,
}

/// A catalog entry with its position and base value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedDemon {
    #[serde(flatten)]
    pub demon: Demon,
    pub rank: usize,
    pub points: i64,
}

/// A player with their total, as listed on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPlayer {
    #[serde(flatten)]
    pub player: Player,
    pub total_points: i64,
}

/// The catalog in order, annotated with rank and full-completion points.
pub fn ranked_demons(demons: &[Demon]) -> Vec<RankedDemon> {
    demons
        .iter()
        .enumerate()
        .map(|(i, demon)| RankedDemon {
            demon: demon.clone(),
            rank: i + 1,
            points: points_for_rank(i + 1),
        })
        .collect()
}

pub fn compute_totals(player: &Player, demons: &[Demon]) -> PlayerTotals {
    totals_with(player, &RankTable::new(demons))
}

/// Score every completed demon that still exists in the catalog. Ids that no
/// longer resolve are skipped without error.
pub fn totals_with(player: &Player, table: &RankTable<'_>) -> PlayerTotals {
    let mut completions: Vec<Completion> = player
        .completed_demons
        .iter()
        .filter_map(|demon_id| {
            let (rank, demon) = table.get(demon_id)?;
            let progress = player.progress_for(demon_id);
            Some(Completion {
                demon: demon.clone(),
                rank,
                points: scaled_points(rank, progress),
                progress,
            })
        })
        .collect();

    let total_points = completions.iter().map(|c| c.points).sum();
    completions.sort_by(|a, b| b.points.cmp(&a.points));

    PlayerTotals {
        total_points,
        completions,
    }
}

impl PlayerTotals {
    pub fn into_stats(self) -> PlayerStats {
        let completed_count = self.completions.len();
        // After the stable sort the first entry is the earliest completion
        // holding the maximum, which is only reported when it scores at all.
        let hardest_demon = self
            .completions
            .first()
            .filter(|c| c.points > 0)
            .cloned();
        let average_rank = if completed_count == 0 {
            0.0
        } else {
            self.completions.iter().map(|c| c.rank as f64).sum::<f64>() / completed_count as f64
        };
        PlayerStats {
            total_points: self.total_points,
            completed_count,
            hardest_demon,
            average_rank,
            completions: self.completions,
        }
    }
}

/// Every player, highest total first. Equal totals keep their stored order.
pub fn rank_players(players: &[Player], demons: &[Demon]) -> Vec<RankedPlayer> {
    let table = RankTable::new(demons);
    let mut ranked: Vec<RankedPlayer> = players
        .iter()
        .map(|player| RankedPlayer {
            total_points: totals_with(player, &table).total_points,
            player: player.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| b.total_points.cmp(&a.total_points));
    ranked
}

/// Leaderboard position of `player_id`.
///
/// Only players with a positive total take part in the numbering. A player
/// outside that pool (zero points or unknown id) gets `pool size + 1`, so
/// zero-point players all share the slot after the last ranked player even
/// though `rank_players` still lists them.
pub fn player_rank(players: &[Player], demons: &[Demon], player_id: &str) -> usize {
    let table = RankTable::new(demons);
    let mut pool: Vec<(&str, i64)> = players
        .iter()
        .map(|p| (p.id.as_str(), totals_with(p, &table).total_points))
        .filter(|(_, points)| *points > 0)
        .collect();
    pool.sort_by(|a, b| b.1.cmp(&a.1));

    pool.iter()
        .position(|(id, _)| *id == player_id)
        .map(|i| i + 1)
        .unwrap_or(pool.len() + 1)
}
