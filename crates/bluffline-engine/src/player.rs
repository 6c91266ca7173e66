use bluffline_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::Card;

/// One roster entry as handed over by the room backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: PlayerId,
    pub name: String,
}

impl Seat {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Alive,
    Eliminated,
}

/// A participant of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub coins: u32,
    pub hand: Vec<Card>,
    pub status: PlayerStatus,
    /// Consecutive turns this player let time out.
    pub ban_stack: u8,
    pub is_win: bool,
}

impl Player {
    pub fn new(seat: Seat, coins: u32) -> Self {
        Self {
            id: seat.id,
            name: seat.name,
            coins,
            hand: Vec::with_capacity(2),
            status: PlayerStatus::Alive,
            ban_stack: 0,
            is_win: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }

    pub fn holds(&self, card: Card) -> bool {
        self.hand.contains(&card)
    }

    /// Removes the last copy of `card` from the hand.
    pub(crate) fn discard(&mut self, card: Card) -> bool {
        match self.hand.iter().rposition(|c| *c == card) {
            Some(pos) => {
                self.hand.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Removes the first copy of `card` from the hand.
    pub(crate) fn reveal(&mut self, card: Card) -> bool {
        match self.hand.iter().position(|c| *c == card) {
            Some(pos) => {
                self.hand.remove(pos);
                true
            }
            None => false,
        }
    }
}
