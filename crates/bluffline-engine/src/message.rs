//! What goes into a session and what comes out of it.
//!
//! Players send [`ClientMessage`]s. Every call into the engine returns an
//! [`Outbox`]: the [`ServerMessage`]s to deliver, each paired with a
//! [`Recipient`], plus the [`Effect`]s the host must carry out against
//! its backend. The engine never performs I/O itself.

use bluffline_protocol::{GameId, PlayerId, Recipient, RoomId};
use serde::{Deserialize, Serialize};

use crate::{ActionKind, Card, ChatEntry, DropReason, GameSnapshot};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// An event sent by a participant of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    DeclareAction {
        action: ActionKind,
        #[serde(default)]
        target: Option<PlayerId>,
    },
    /// Blocks the outstanding action. `card` may be omitted when the
    /// action can only be blocked by one kind.
    Block {
        action: ActionKind,
        #[serde(default)]
        card: Option<Card>,
    },
    Challenge,
    ShowCard {
        card: Card,
    },
    DropCard {
        card: Card,
    },
    ConfirmExchange {
        keep: Vec<Card>,
    },
    /// Declines to respond; in the vote phase, signals readiness.
    Pass,
    Leave,
    Chat {
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full authoritative state.
    State(Box<GameSnapshot>),
    /// Asks for a block, a challenge or a pass on `claimant`'s claim.
    ChooseBlockOrChallenge {
        claimant: PlayerId,
        action: ActionKind,
        claim: Option<Card>,
    },
    ChooseCardToShow {
        challenger: PlayerId,
        claim: Card,
    },
    ChooseCardToDrop {
        reason: DropReason,
    },
    ChooseExchange {
        available: Vec<Card>,
        keep: usize,
    },
    History {
        entry: String,
    },
    Chat(ChatEntry),
    RedirectToBan,
    RedirectToNewGame {
        room_id: RoomId,
        game_id: GameId,
    },
    RedirectToHomepage,
}

/// A side effect the host carries out against its backend.
///
/// The session does not wait for effects and does not care whether they
/// succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RecordBan {
        player: PlayerId,
        minutes: u32,
    },
    RemoveFromRoom {
        room: RoomId,
        player: PlayerId,
    },
    ClearLocation {
        player: PlayerId,
    },
    RecordResult {
        player: PlayerId,
        won: bool,
    },
    /// Marks the room finished and the game record closed.
    FinishGame {
        room: RoomId,
        game: GameId,
    },
    /// Opens a follow-on room owned by `owner` and redirects `players`
    /// into it. Falls back to the homepage if that fails.
    CreateRematch {
        owner: PlayerId,
        players: Vec<PlayerId>,
    },
}

/// Everything one engine call produced.
#[derive(Debug, Default)]
pub struct Outbox {
    pub messages: Vec<(Recipient, ServerMessage)>,
    pub effects: Vec<Effect>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.effects.is_empty()
    }

    pub fn push(&mut self, to: Recipient, message: ServerMessage) {
        self.messages.push((to, message));
    }

    pub fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Messages `player` would receive, in order.
    pub fn for_player(&self, player: PlayerId) -> impl Iterator<Item = &ServerMessage> {
        self.messages
            .iter()
            .filter(move |(to, _)| to.includes(player))
            .map(|(_, m)| m)
    }
}
