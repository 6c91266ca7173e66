//! Room-fill countdowns.
//!
//! When a waiting room reaches capacity a short countdown starts; when it
//! reaches zero the room's owner is expected to start the session. Anyone
//! leaving during the countdown cancels it.
//!
//! The countdowns do not own a clock. The host calls
//! [`FillCountdowns::tick`] once per second and forwards the returned
//! [`FillEvent`]s to the room's members.

use std::collections::HashMap;

use bluffline_protocol::RoomId;
use serde::{Deserialize, Serialize};

/// Configuration for room-fill countdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Members needed to start the countdown.
    pub capacity: usize,
    pub seconds: u32,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            capacity: 6,
            seconds: 15,
        }
    }
}

impl FillConfig {
    /// Returns a copy with zero values replaced by 1.
    pub fn validated(self) -> Self {
        let mut config = self;
        if config.capacity == 0 {
            tracing::warn!("fill capacity 0 is invalid, using 1");
            config.capacity = 1;
        }
        if config.seconds == 0 {
            tracing::warn!("fill countdown of 0 seconds is invalid, using 1");
            config.seconds = 1;
        }
        config
    }
}

/// Something the room's members should be told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillEvent {
    Update { room: RoomId, seconds_left: u32 },
    Stopped { room: RoomId },
    Finished { room: RoomId },
}

impl FillEvent {
    pub fn room(&self) -> RoomId {
        match *self {
            Self::Update { room, .. } | Self::Stopped { room } | Self::Finished { room } => room,
        }
    }
}

/// All running room-fill countdowns, keyed by room.
#[derive(Debug)]
pub struct FillCountdowns {
    config: FillConfig,
    running: HashMap<RoomId, u32>,
}

impl FillCountdowns {
    pub fn new(config: FillConfig) -> Self {
        Self {
            config: config.validated(),
            running: HashMap::new(),
        }
    }

    pub fn config(&self) -> FillConfig {
        self.config
    }

    /// Reacts to a room's member count changing.
    ///
    /// At capacity a countdown starts, or if one is already running its
    /// current value is reported again for the newcomer. Below capacity a
    /// running countdown is cancelled.
    pub fn roster_changed(&mut self, room: RoomId, members: usize) -> Option<FillEvent> {
        if members >= self.config.capacity {
            let seconds_left = *self.running.entry(room).or_insert_with(|| {
                tracing::info!(%room, members, "room full, countdown started");
                self.config.seconds
            });
            return Some(FillEvent::Update { room, seconds_left });
        }
        self.stop(room)
    }

    /// Cancels the room's countdown. `None` if none was running.
    pub fn stop(&mut self, room: RoomId) -> Option<FillEvent> {
        self.running.remove(&room)?;
        tracing::info!(%room, "countdown stopped");
        Some(FillEvent::Stopped { room })
    }

    /// The running countdown's value, for a client that asks.
    pub fn current(&self, room: RoomId) -> Option<FillEvent> {
        self.running
            .get(&room)
            .map(|&seconds_left| FillEvent::Update { room, seconds_left })
    }

    pub fn is_running(&self, room: RoomId) -> bool {
        self.running.contains_key(&room)
    }

    /// Advances every countdown by one second.
    ///
    /// Each running room gets an update; a room that reaches zero also gets
    /// `Finished` and its countdown is removed.
    pub fn tick(&mut self) -> Vec<FillEvent> {
        let mut events = Vec::with_capacity(self.running.len());
        self.running.retain(|&room, seconds_left| {
            *seconds_left = seconds_left.saturating_sub(1);
            events.push(FillEvent::Update {
                room,
                seconds_left: *seconds_left,
            });
            if *seconds_left == 0 {
                tracing::info!(%room, "countdown finished");
                events.push(FillEvent::Finished { room });
                return false;
            }
            true
        });
        events
    }
}

impl Default for FillCountdowns {
    fn default() -> Self {
        Self::new(FillConfig::default())
    }
}
