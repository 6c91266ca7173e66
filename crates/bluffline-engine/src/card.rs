//! Card kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the five influence cards.
///
/// What each card lets its holder claim is defined by the action table in
/// [`rules`](crate::rules), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Card {
    /// Tax collector; also blocks foreign aid.
    Lion,
    /// Blocks assassination.
    Turtle,
    /// Steals; also blocks stealing.
    Cat,
    /// Exchanges; also blocks stealing.
    Bear,
    /// Assassinates.
    Crocodile,
}

impl Card {
    pub const ALL: [Card; 5] = [
        Card::Lion,
        Card::Turtle,
        Card::Cat,
        Card::Bear,
        Card::Crocodile,
    ];

    /// Copies of each kind in a full deck.
    pub const COPIES: usize = 3;

    /// Total cards in play for the whole session. Lost and exchanged cards
    /// go back to the deck, so hands plus deck always add up to this.
    pub const DECK_SIZE: usize = Self::ALL.len() * Self::COPIES;

    pub fn name(self) -> &'static str {
        match self {
            Self::Lion => "lion",
            Self::Turtle => "turtle",
            Self::Cat => "cat",
            Self::Bear => "bear",
            Self::Crocodile => "crocodile",
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
