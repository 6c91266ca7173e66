//! Named per-session countdowns.
//!
//! A session has exactly five timers, one per [`TimerKind`]. Each is a
//! whole-second countdown that the owning session decrements once per
//! tick. The bank itself never sleeps or spawns; whoever owns it calls
//! [`TimerBank::tick`] on a one-second cadence and reacts to the
//! [`Expired`] records it returns.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// The five countdowns a session can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Waiting for the turn holder to declare an action.
    Turn,
    /// Response windows: block/challenge, reveal, and most card drops.
    Popup,
    /// Short beat between a landed assassination and the forced discard.
    Assassinate,
    /// Initiator choosing which cards to keep after an exchange draw.
    Exchange,
    /// Post-win ready-up window.
    Vote,
}

impl TimerKind {
    /// All kinds, in slot order.
    pub const ALL: [TimerKind; 5] = [
        TimerKind::Turn,
        TimerKind::Popup,
        TimerKind::Assassinate,
        TimerKind::Exchange,
        TimerKind::Vote,
    ];

    fn slot(self) -> usize {
        match self {
            Self::Turn => 0,
            Self::Popup => 1,
            Self::Assassinate => 2,
            Self::Exchange => 3,
            Self::Vote => 4,
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Turn => "turn",
            Self::Popup => "popup",
            Self::Assassinate => "assassinate",
            Self::Exchange => "exchange",
            Self::Vote => "vote",
        };
        f.write_str(name)
    }
}

/// One armed countdown.
///
/// `epoch` identifies what the timer was armed *for*. The owner bumps its
/// epoch on every phase change, so an expiry whose epoch no longer matches
/// belongs to a phase that has already been left and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub remaining: u32,
    pub epoch: u64,
}

/// A countdown that reached zero on the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    pub kind: TimerKind,
    pub epoch: u64,
}

/// The five countdown slots of one session.
#[derive(Debug, Clone, Default)]
pub struct TimerBank {
    slots: [Option<Countdown>; 5],
}

impl TimerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `kind` for `secs` seconds.
    ///
    /// Any existing countdown of the same kind is replaced (restart is
    /// idempotent). Arming anything other than [`TimerKind::Vote`] also
    /// cancels the turn timer: the turn clock only runs while nothing is
    /// outstanding.
    pub fn arm(&mut self, kind: TimerKind, secs: u32, epoch: u64) {
        if kind != TimerKind::Vote && kind != TimerKind::Turn {
            self.disarm(TimerKind::Turn);
        }
        self.slots[kind.slot()] = Some(Countdown {
            remaining: secs,
            epoch,
        });
        trace!(%kind, secs, epoch, "timer armed");
    }

    /// Cancels `kind`. Returns `true` if it was armed.
    pub fn disarm(&mut self, kind: TimerKind) -> bool {
        self.slots[kind.slot()].take().is_some()
    }

    /// Cancels every countdown.
    pub fn disarm_all(&mut self) {
        self.slots = [None; 5];
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    /// Seconds left on `kind`, or 0 when it is not armed.
    pub fn remaining(&self, kind: TimerKind) -> u32 {
        self.slots[kind.slot()].map_or(0, |c| c.remaining)
    }

    pub fn get(&self, kind: TimerKind) -> Option<Countdown> {
        self.slots[kind.slot()]
    }

    /// The kinds currently armed, in slot order.
    pub fn armed(&self) -> impl Iterator<Item = TimerKind> + '_ {
        TimerKind::ALL
            .into_iter()
            .filter(|kind| self.is_armed(*kind))
    }

    /// Advances every armed countdown by one second.
    ///
    /// Countdowns that reach zero are disarmed and reported. A countdown
    /// armed with 0 seconds expires on the first tick.
    pub fn tick(&mut self) -> Vec<Expired> {
        let mut expired = Vec::new();
        for kind in TimerKind::ALL {
            let slot = &mut self.slots[kind.slot()];
            if let Some(countdown) = slot {
                countdown.remaining = countdown.remaining.saturating_sub(1);
                if countdown.remaining == 0 {
                    expired.push(Expired {
                        kind,
                        epoch: countdown.epoch,
                    });
                    *slot = None;
                }
            }
        }
        expired
    }
}
