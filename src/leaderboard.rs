//! Leaderboard projection
//!
//! Standings are derived on demand from the players' current scores rather
//! than accumulated separately: the session hands over `(id, name, score)`
//! rows in join order and receives a ranked view back.

use std::cmp::Reverse;

use itertools::Itertools;
use serde::Serialize;

use super::session::Id;

/// One ranked row of the leaderboard
///
/// Ranks follow competition ranking: tied scores share a rank, and the rank
/// after a tie skips ahead to the row's 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// 1-based rank; equal scores share the same rank
    pub rank: usize,
    /// The player's display name
    pub name: String,
    /// The player's total score
    pub score: u64,
    /// The player's connection id, so clients can find their own row
    pub id: Id,
}

/// Projects player standings into a ranked leaderboard
///
/// Sorts by score descending; the sort is stable, so callers control the
/// order of tied entries by the order they supply rows in (the session
/// supplies them in join order).
///
/// # Arguments
///
/// * `standings` - `(id, name, score)` rows, one per player
pub fn project<I>(standings: I) -> Vec<Entry>
where
    I: IntoIterator<Item = (Id, String, u64)>,
{
    let mut rank = 0;
    let mut previous_score = None;

    standings
        .into_iter()
        .sorted_by_key(|(_, _, score)| Reverse(*score))
        .enumerate()
        .map(|(position, (id, name, score))| {
            if previous_score != Some(score) {
                rank = position + 1;
                previous_score = Some(score);
            }
            Entry {
                rank,
                name,
                score,
                id,
            }
        })
        .collect_vec()
}
