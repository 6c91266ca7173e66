//! Where a session is in its turn, and what it is waiting for.

use bluffline_protocol::PlayerId;
use bluffline_tick::TimerKind;
use serde::Serialize;

use crate::{ActionKind, Card};

/// Whose claim is on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSource {
    Actor,
    Blocker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Block {
    pub by: PlayerId,
    pub card: Card,
}

/// The action being resolved this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentAction {
    pub kind: ActionKind,
    pub actor: PlayerId,
    pub claim: Option<Card>,
    pub target: Option<PlayerId>,
    pub block: Option<Block>,
    /// Set once the target has been given a second window after the
    /// actor's claim survived a challenge.
    pub second_phase: bool,
    /// Set while the exchange pool has been drawn but not yet settled.
    pub exchanged: bool,
}

impl CurrentAction {
    pub fn new(kind: ActionKind, actor: PlayerId, target: Option<PlayerId>) -> Self {
        Self {
            kind,
            actor,
            claim: kind.claim(),
            target,
            block: None,
            second_phase: false,
            exchanged: false,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.block.is_some()
    }

    pub fn involves(&self, player: PlayerId) -> bool {
        self.actor == player
            || self.target == Some(player)
            || self.block.is_some_and(|b| b.by == player)
    }
}

/// An open challenge waiting for the claimant to show a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Challenge {
    pub challenger: PlayerId,
    pub claimant: PlayerId,
    pub claim: Card,
    pub source: ClaimSource,
}

/// Why a player has to give up a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "claim", rename_all = "snake_case")]
pub enum DropReason {
    /// The challenger was wrong about a claim from this source.
    ChallengeFailed(ClaimSource),
    /// The claimant from this source was bluffing.
    BluffCaught(ClaimSource),
    Coup,
    Assassinated,
}

/// A completion token that can be claimed exactly once.
///
/// A pending drop or exchange can be settled by the player or by its
/// timer. Whichever gets here first claims the token; the other sees it
/// spent and does nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneShot {
    spent: bool,
}

impl OneShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller only.
    pub fn claim(&mut self) -> bool {
        !std::mem::replace(&mut self.spent, true)
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropRequest {
    pub player: PlayerId,
    pub reason: DropReason,
    /// Whether the player has been asked to choose yet. An assassination's
    /// victim is asked one tick into the assassinate countdown.
    #[serde(skip)]
    pub(crate) prompted: bool,
    #[serde(skip)]
    pub(crate) token: OneShot,
}

impl DropRequest {
    pub fn new(player: PlayerId, reason: DropReason) -> Self {
        Self {
            player,
            reason,
            prompted: false,
            token: OneShot::new(),
        }
    }

    pub fn is_prompted(&self) -> bool {
        self.prompted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeRequest {
    pub player: PlayerId,
    /// Cards drawn from the deck into the pool. They belong to nobody
    /// until the selection is settled.
    #[serde(skip)]
    pub drawn: Vec<Card>,
    /// How many cards the player must keep.
    pub keep: usize,
    #[serde(skip)]
    pub(crate) token: OneShot,
}

impl ExchangeRequest {
    pub fn new(player: PlayerId, drawn: Vec<Card>, keep: usize) -> Self {
        Self {
            player,
            drawn,
            keep,
            token: OneShot::new(),
        }
    }
}

/// The state machine of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "pending", rename_all = "snake_case")]
pub enum Phase {
    AwaitingTurnAction,
    /// Block/challenge window on the current action or its block.
    AwaitingResponse,
    /// Window reopened for the target after the actor's claim held up.
    AwaitingSecondResponse,
    AwaitingReveal(Challenge),
    AwaitingCardDrop(DropRequest),
    AwaitingExchangeSelection(ExchangeRequest),
    AwaitingVotes,
    Finished,
}

impl Phase {
    /// The countdown that guards this phase.
    pub fn timer(&self) -> Option<TimerKind> {
        match self {
            Self::AwaitingTurnAction => Some(TimerKind::Turn),
            Self::AwaitingResponse | Self::AwaitingSecondResponse | Self::AwaitingReveal(_) => {
                Some(TimerKind::Popup)
            }
            Self::AwaitingCardDrop(request) => match request.reason {
                DropReason::Assassinated => Some(TimerKind::Assassinate),
                _ => Some(TimerKind::Popup),
            },
            Self::AwaitingExchangeSelection(_) => Some(TimerKind::Exchange),
            Self::AwaitingVotes => Some(TimerKind::Vote),
            Self::Finished => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingTurnAction => "awaiting_turn_action",
            Self::AwaitingResponse => "awaiting_response",
            Self::AwaitingSecondResponse => "awaiting_second_response",
            Self::AwaitingReveal(_) => "awaiting_reveal",
            Self::AwaitingCardDrop(_) => "awaiting_card_drop",
            Self::AwaitingExchangeSelection(_) => "awaiting_exchange_selection",
            Self::AwaitingVotes => "awaiting_votes",
            Self::Finished => "finished",
        }
    }

    pub fn is_response_window(&self) -> bool {
        matches!(self, Self::AwaitingResponse | Self::AwaitingSecondResponse)
    }

    /// Whether `player` is the one this phase is waiting on.
    pub fn waits_on(&self, player: PlayerId) -> bool {
        match self {
            Self::AwaitingReveal(c) => c.claimant == player || c.challenger == player,
            Self::AwaitingCardDrop(r) => r.player == player,
            Self::AwaitingExchangeSelection(r) => r.player == player,
            _ => false,
        }
    }
}
