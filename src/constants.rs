//! Configuration constants for the Kanji Zoo game system
//!
//! This module contains the limits and timing defaults used throughout the
//! game; per-session overrides go through [`crate::game::Options`].

/// Session-wide configuration constants
pub mod session {
    /// Maximum number of players allowed in a single game session
    pub const MAX_PLAYER_COUNT: usize = 1000;
}

/// Round timing configuration constants
pub mod round {
    use std::time::Duration;

    /// Default time players have to answer a question
    pub const TIME_LIMIT: Duration = Duration::from_millis(10_000);
    /// Default time the correct answer stays on screen between rounds
    pub const REVEAL_TIME: Duration = Duration::from_millis(3_500);
    /// Minimum time limit in seconds for answering a question
    pub const MIN_TIME_LIMIT: u64 = 1;
    /// Maximum time limit in seconds for answering a question
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Minimum reveal duration in seconds
    pub const MIN_REVEAL_TIME: u64 = 0;
    /// Maximum reveal duration in seconds
    pub const MAX_REVEAL_TIME: u64 = 30;
}

/// Catalog and question configuration constants
pub mod catalog {
    /// Default number of catalog items covered by one game
    pub const ITEMS_PER_GAME: usize = 10;
    /// Maximum number of catalog items covered by one game
    pub const MAX_ITEMS_PER_GAME: usize = 100;
    /// Number of rounds played per item (kanji, then hiragana)
    pub const ROUNDS_PER_ITEM: usize = 2;
    /// Number of answer options shown for every question
    pub const CHOICE_COUNT: usize = 4;
}

/// Player configuration constants
pub mod player {
    /// Maximum length of a player display name in characters
    pub const MAX_NAME_LENGTH: usize = 15;
}

/// Scoring configuration constants
pub mod score {
    /// Points awarded for an instantaneous correct answer
    pub const CEILING: u64 = 1000;
    /// Minimum points awarded for any correct answer, however late
    pub const FLOOR: u64 = 100;
}
