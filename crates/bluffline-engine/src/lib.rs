//! Rules engine for Bluffline.
//!
//! A [`Game`] is the authoritative simulation of one session: it deals
//! from a fifteen-card [`Deck`], walks the [`TurnRing`], and resolves
//! every declared action through blocks, challenges, reveals and card
//! loss until one player is left standing. It is pure and synchronous;
//! the host owns the clock and the I/O and drives it through
//! [`Game::handle`] and [`Game::tick`].

mod card;
mod config;
mod deck;
mod game;
mod log;
mod message;
mod phase;
mod player;
mod ring;
pub mod rules;
mod snapshot;

pub use card::Card;
pub use config::GameConfig;
pub use deck::Deck;
pub use game::{Departure, Game, HAND_SIZE, MAX_PLAYERS, MIN_PLAYERS, SetupError};
pub use log::{BoundedLog, ChatEntry};
pub use message::{ClientMessage, Effect, Outbox, ServerMessage};
pub use phase::{
    Block, Challenge, ClaimSource, CurrentAction, DropReason, DropRequest, ExchangeRequest,
    OneShot, Phase,
};
pub use player::{Player, PlayerStatus, Seat};
pub use ring::TurnRing;
pub use rules::{ActionKind, ActionRule};
pub use snapshot::{GameSnapshot, TimerSnapshot};
