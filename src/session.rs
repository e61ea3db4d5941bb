//! Connection identity and the broadcast gateway
//!
//! This module defines the per-connection identifier and the narrow
//! interface the game uses to push events out to connected clients. The
//! gateway abstraction keeps the core free of any transport dependency:
//! implementations might use WebSockets, Server-Sent Events, or an in-memory
//! capture for tests.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use super::game::UpdateMessage;

/// A unique identifier for a connected participant
///
/// Each connection (player or host display) gets a unique id that persists
/// for the lifetime of the connection. Players are keyed by it in the
/// session, and leaderboard rows carry it so clients can find themselves.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random connection id (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the id as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an id from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Outbound fan-out interface injected into the game
///
/// The game treats delivery as fire-and-forget: neither method returns a
/// result, and a send to a connection that has since gone away is simply
/// dropped by the implementation.
pub trait Gateway {
    /// Delivers an event to every connected participant
    fn send_to_all(&self, message: &UpdateMessage);

    /// Delivers an event to a single participant
    ///
    /// # Arguments
    ///
    /// * `id` - The target connection
    /// * `message` - The event to deliver
    fn send_to_one(&self, id: Id, message: &UpdateMessage);
}
