//! The action table.
//!
//! Every question the resolver asks about an action (what it costs,
//! whether it needs a target, which card it claims, who may block it and
//! whether a vindicated claim reopens a window for the target) is answered
//! here from one explicit row per action.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Card;

/// Coins paid by the actor to launch a coup.
pub const COUP_COST: u32 = 7;
/// Coins paid by the actor to attempt an assassination.
pub const ASSASSINATE_COST: u32 = 3;
/// A player holding this many coins when their turn times out is made to
/// coup a random opponent.
pub const FORCED_COUP_THRESHOLD: u32 = 10;

pub const INCOME_GAIN: u32 = 1;
pub const FOREIGN_AID_GAIN: u32 = 2;
pub const TAX_GAIN: u32 = 3;
/// Upper bound on what one steal moves; the target's balance caps it.
pub const STEAL_AMOUNT: u32 = 2;
/// Cards drawn into the exchange pool.
pub const EXCHANGE_DRAW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Income,
    ForeignAid,
    Coup,
    Tax,
    Assassinate,
    Exchange,
    Steal,
}

/// One row of the action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRule {
    /// Paid up front on declaration and never refunded.
    pub cost: u32,
    pub targeted: bool,
    /// The card the actor asserts they hold. `None` means the action cannot
    /// be challenged.
    pub claim: Option<Card>,
    /// Cards a blocker may claim. Empty means the action cannot be blocked.
    pub blockers: &'static [Card],
    /// Whether a failed challenge against the actor reopens a response
    /// window for the target.
    pub second_phase: bool,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Income,
        ActionKind::ForeignAid,
        ActionKind::Coup,
        ActionKind::Tax,
        ActionKind::Assassinate,
        ActionKind::Exchange,
        ActionKind::Steal,
    ];

    pub const fn rule(self) -> ActionRule {
        match self {
            Self::Income => ActionRule {
                cost: 0,
                targeted: false,
                claim: None,
                blockers: &[],
                second_phase: false,
            },
            Self::ForeignAid => ActionRule {
                cost: 0,
                targeted: false,
                claim: Some(Card::Lion),
                blockers: &[Card::Lion],
                second_phase: false,
            },
            Self::Coup => ActionRule {
                cost: COUP_COST,
                targeted: true,
                claim: None,
                blockers: &[],
                second_phase: false,
            },
            Self::Tax => ActionRule {
                cost: 0,
                targeted: false,
                claim: Some(Card::Lion),
                blockers: &[],
                second_phase: false,
            },
            Self::Assassinate => ActionRule {
                cost: ASSASSINATE_COST,
                targeted: true,
                claim: Some(Card::Crocodile),
                blockers: &[Card::Turtle],
                second_phase: true,
            },
            Self::Exchange => ActionRule {
                cost: 0,
                targeted: false,
                claim: Some(Card::Bear),
                blockers: &[],
                second_phase: false,
            },
            Self::Steal => ActionRule {
                cost: 0,
                targeted: true,
                claim: Some(Card::Cat),
                blockers: &[Card::Cat, Card::Bear],
                second_phase: true,
            },
        }
    }

    pub fn claim(self) -> Option<Card> {
        self.rule().claim
    }

    pub fn is_blockable(self) -> bool {
        !self.rule().blockers.is_empty()
    }

    pub fn can_block_with(self, card: Card) -> bool {
        self.rule().blockers.contains(&card)
    }

    /// Human-readable name used in history lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::ForeignAid => "foreign aid",
            Self::Coup => "coup",
            Self::Tax => "tax",
            Self::Assassinate => "assassination",
            Self::Exchange => "exchange",
            Self::Steal => "steal",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
