//! Session tuning.

use bluffline_tick::TimerKind;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-session settings. Every field has a default, so a partial JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seconds the turn holder has to declare an action.
    pub turn_secs: u32,
    /// Seconds for every other window: responses, reveals, drops, the
    /// assassination beat, exchange selection and the post-game vote.
    pub popup_secs: u32,
    /// Ban length recorded for a player removed for idling.
    pub ban_minutes: u32,
    pub starting_coins: u32,
    /// Timed-out turns in a row before a player is banned.
    pub max_ban_stack: u8,
    pub chat_capacity: usize,
    pub history_capacity: usize,
    /// Fixes dealing, shuffling and every timeout auto-choice.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_secs: 30,
            popup_secs: 10,
            ban_minutes: 30,
            starting_coins: 2,
            max_ban_stack: 3,
            chat_capacity: 30,
            history_capacity: 5,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Clamps values a session cannot run with.
    pub fn validated(mut self) -> Self {
        if self.turn_secs == 0 {
            warn!("turn_secs of 0 would expire every turn immediately, using 1");
            self.turn_secs = 1;
        }
        if self.popup_secs == 0 {
            warn!("popup_secs of 0 would close every window immediately, using 1");
            self.popup_secs = 1;
        }
        if self.max_ban_stack == 0 {
            warn!("max_ban_stack of 0 would ban on the first timeout, using 1");
            self.max_ban_stack = 1;
        }
        if self.chat_capacity == 0 {
            warn!("chat_capacity of 0 requested, using 1");
            self.chat_capacity = 1;
        }
        if self.history_capacity == 0 {
            warn!("history_capacity of 0 requested, using 1");
            self.history_capacity = 1;
        }
        self
    }

    /// Seconds a countdown of `kind` is armed for.
    pub fn seconds_for(&self, kind: TimerKind) -> u32 {
        match kind {
            TimerKind::Turn => self.turn_secs,
            TimerKind::Popup | TimerKind::Assassinate | TimerKind::Exchange | TimerKind::Vote => {
                self.popup_secs
            }
        }
    }
}
