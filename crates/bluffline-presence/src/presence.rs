//! The presence registry: who is online and where each player belongs.
//!
//! Two maps live here:
//! - player → connection, so the engine's per-player messages can be
//!   routed to whichever socket that player currently holds
//! - player → [`Location`], so a client that reloads mid-game can be
//!   sent back to the right room and session
//!
//! # Concurrency note
//!
//! `PresenceRegistry` uses plain `HashMap`s and is not thread-safe on its
//! own. The host owns one instance and shares it behind a mutex.

use std::collections::HashMap;

use bluffline_protocol::{ConnectionId, GameId, PlayStatus, PlayerId, RoomId};
use serde::{Deserialize, Serialize};

/// Where a player was last seen: a room, and once play starts, a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub room_id: Option<RoomId>,
    pub game_id: Option<GameId>,
}

impl Location {
    /// A player waiting in a room before the session exists.
    pub fn room(room_id: RoomId) -> Self {
        Self {
            room_id: Some(room_id),
            game_id: None,
        }
    }

    /// A player seated in a running session.
    pub fn game(room_id: RoomId, game_id: GameId) -> Self {
        Self {
            room_id: Some(room_id),
            game_id: Some(game_id),
        }
    }
}

/// What the room store knows about a room when a player asks to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStatus {
    pub play_status: PlayStatus,
    /// The session currently being played in the room, if any.
    pub active_game: Option<GameId>,
}

/// Tracks live connections and last-known locations for every player.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ set_location() ──→ resume() ──→ clear_location()
///     │                                              │
///     ▼                                              ▼
/// disconnect()                              [no location: homepage]
/// ```
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// One live connection per player; a newer connection replaces it.
    online: HashMap<PlayerId, ConnectionId>,

    /// Survives disconnects. Only cleared on purpose.
    locations: HashMap<PlayerId, Location>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Registers `connection` as the player's live socket.
    ///
    /// Returns the connection it replaced, if the player was already online
    /// from somewhere else.
    pub fn connect(&mut self, player: PlayerId, connection: ConnectionId) -> Option<ConnectionId> {
        let previous = self.online.insert(player, connection);
        tracing::info!(
            %player,
            %connection,
            replaced = previous.is_some(),
            online = self.online.len(),
            "player connected"
        );
        previous
    }

    /// Drops the player's connection if it is still `connection`.
    ///
    /// A disconnect from a socket that has already been replaced is
    /// ignored, so a stale close can never take a fresh tab offline.
    pub fn disconnect(&mut self, player: PlayerId, connection: ConnectionId) -> bool {
        if self.online.get(&player) != Some(&connection) {
            tracing::debug!(%player, %connection, "ignoring disconnect from replaced connection");
            return false;
        }
        self.online.remove(&player);
        tracing::info!(%player, %connection, online = self.online.len(), "player disconnected");
        true
    }

    pub fn connection_of(&self, player: PlayerId) -> Option<ConnectionId> {
        self.online.get(&player).copied()
    }

    pub fn is_online(&self, player: PlayerId) -> bool {
        self.online.contains_key(&player)
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    // -----------------------------------------------------------------------
    // Locations
    // -----------------------------------------------------------------------

    pub fn set_location(&mut self, player: PlayerId, location: Location) {
        tracing::debug!(%player, ?location, "location updated");
        self.locations.insert(player, location);
    }

    /// Forgets where the player was. Returns whether anything was stored.
    pub fn clear_location(&mut self, player: PlayerId) -> bool {
        let removed = self.locations.remove(&player).is_some();
        if removed {
            tracing::debug!(%player, "location cleared");
        }
        removed
    }

    pub fn location_of(&self, player: PlayerId) -> Option<Location> {
        self.locations.get(&player).copied()
    }

    /// Works out where a returning player should be sent.
    ///
    /// `lookup` reports the current state of the stored room, or `None`
    /// if the room no longer exists. The stored location is refined on the
    /// way:
    /// - no room recorded: the entry is dropped
    /// - room finished: the entry is dropped
    /// - room started but no session recorded: the room's active session
    ///   is adopted
    /// - room gone: nothing is returned but the entry is kept
    pub fn resume(
        &mut self,
        player: PlayerId,
        lookup: impl FnOnce(RoomId) -> Option<RoomStatus>,
    ) -> Option<Location> {
        let location = self.locations.get(&player).copied()?;

        let Some(room_id) = location.room_id else {
            self.locations.remove(&player);
            return None;
        };

        let status = lookup(room_id)?;
        match status.play_status {
            PlayStatus::Finished => {
                self.locations.remove(&player);
                tracing::debug!(%player, %room_id, "room finished, location dropped");
                None
            }
            PlayStatus::Started if location.game_id.is_none() => {
                let refreshed = Location {
                    room_id: Some(room_id),
                    game_id: status.active_game,
                };
                self.locations.insert(player, refreshed);
                Some(refreshed)
            }
            _ => Some(location),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
