//! Host configuration.

use bluffline_engine::GameConfig;
use bluffline_presence::FillConfig;
use bluffline_room::DEFAULT_CHANNEL_SIZE;
use serde::{Deserialize, Serialize};

use crate::BlufflineError;

/// Everything the host needs to run sessions and rooms.
///
/// Every field has a default, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Settings handed to every new session.
    pub game: GameConfig,

    /// Members needed to start a room's fill countdown.
    pub room_capacity: usize,

    /// Length of the fill countdown in seconds.
    pub room_fill_secs: u32,

    /// Command queue size of each session actor.
    pub session_channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            room_capacity: 6,
            room_fill_secs: 15,
            session_channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BlufflineError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Returns a copy with out-of-range values clamped.
    pub fn validated(self) -> Self {
        let mut config = self;
        config.game = config.game.validated();
        if config.session_channel_size == 0 {
            tracing::warn!("session channel size 0 is invalid, using 1");
            config.session_channel_size = 1;
        }
        let fill = config.fill().validated();
        config.room_capacity = fill.capacity;
        config.room_fill_secs = fill.seconds;
        config
    }

    pub fn fill(&self) -> FillConfig {
        FillConfig {
            capacity: self.room_capacity,
            seconds: self.room_fill_secs,
        }
    }
}
