//! Player name handling
//!
//! Join requests carry a free-form display name. Names are trimmed,
//! truncated to the configured length on a character boundary, and content
//! filtered; a name that comes out empty is replaced with a generated one so
//! that joining never fails on account of the name.

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};

use crate::constants::player::MAX_NAME_LENGTH;

/// Defines the style of automatically generated player names
///
/// Used as the fallback for players who join with an empty or
/// whitespace-only name.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, garde::Validate)]
pub enum NameStyle {
    /// Roman-style names (praenomen + nomen, optionally + cognomen)
    Roman(#[garde(range(min = 2, max = 3))] usize),
    /// Pet-style names (adjective + animal combinations)
    Petname(#[garde(range(min = 2, max = 3))] usize),
}

impl Default for NameStyle {
    /// Default name style is Petname with 2 words
    fn default() -> Self {
        Self::Petname(2)
    }
}

impl NameStyle {
    /// Generates a random name according to this style
    pub fn get_name(&self) -> String {
        match self {
            Self::Roman(count) => romanname::romanname(romanname::NameConfig {
                praenomen: *count > 2,
            }),
            Self::Petname(count) => petname::petname(*count as u8, " ").unwrap_or_default(),
        }
        .to_title_case()
    }
}

/// Cleans a requested display name into one safe to broadcast
///
/// Trims surrounding whitespace, truncates to
/// [`MAX_NAME_LENGTH`] characters, and censors inappropriate
/// content in place. An empty result falls back to a name generated with
/// `fallback`.
///
/// # Arguments
///
/// * `requested` - The raw name from the join request
/// * `fallback` - Style used to generate a replacement for empty names
pub fn clean(requested: &str, fallback: NameStyle) -> String {
    let trimmed = rustrict::trim_whitespace(requested);
    let truncated: String = trimmed.chars().take(MAX_NAME_LENGTH).collect();

    if truncated.is_empty() {
        return fallback.get_name();
    }

    if truncated.is_inappropriate() {
        truncated.censor()
    } else {
        truncated
    }
}
