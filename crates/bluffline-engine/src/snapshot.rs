use bluffline_protocol::{GameId, PlayerId, RoomId};
use bluffline_tick::{TimerBank, TimerKind};
use serde::Serialize;

use crate::{CurrentAction, Phase, Player};

/// Seconds left on each countdown; 0 when not armed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub turn: u32,
    pub popup: u32,
    pub assassinate: u32,
    pub exchange: u32,
    pub vote: u32,
}

impl From<&TimerBank> for TimerSnapshot {
    fn from(bank: &TimerBank) -> Self {
        Self {
            turn: bank.remaining(TimerKind::Turn),
            popup: bank.remaining(TimerKind::Popup),
            assassinate: bank.remaining(TimerKind::Assassinate),
            exchange: bank.remaining(TimerKind::Exchange),
            vote: bank.remaining(TimerKind::Vote),
        }
    }
}

/// The full state of one session as broadcast to its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub room_id: RoomId,
    pub phase: Phase,
    /// In seating order.
    pub players: Vec<Player>,
    pub turn: Option<PlayerId>,
    pub action: Option<CurrentAction>,
    pub passed: Vec<PlayerId>,
    pub deck_size: usize,
    pub timers: TimerSnapshot,
    pub winner: Option<PlayerId>,
}
