//! Answer scoring
//!
//! Points decay linearly with answer latency: an instantaneous answer earns
//! the full ceiling, an answer at the time limit earns the floor, and
//! anything past the limit is clamped to the floor rather than rejected.

use std::time::Duration;

use crate::constants::score::{CEILING, FLOOR};

/// Calculates the points awarded for a correct answer
///
/// The award decays linearly from [`CEILING`] to [`FLOOR`] as `elapsed`
/// approaches `time_limit`, rounded to the nearest integer. Answers slower
/// than the limit (possible during the reveal window) still earn the floor.
///
/// # Arguments
///
/// * `elapsed` - Time between the question broadcast and the answer
/// * `time_limit` - The round's full answer window
pub fn points(elapsed: Duration, time_limit: Duration) -> u64 {
    let fraction = if time_limit.is_zero() {
        1.0
    } else {
        elapsed.as_secs_f64() / time_limit.as_secs_f64()
    };

    let raw = CEILING as f64 - fraction * (CEILING - FLOOR) as f64;

    raw.round().max(FLOOR as f64) as u64
}
