//! # Bluffline
//!
//! Authoritative real-time host for a six-seat bluffing card game.
//!
//! Each game runs as its own session actor: the rules engine decides,
//! five named countdowns keep play moving when someone goes quiet, and
//! every transition is broadcast as a full snapshot. The host supplies a
//! [`Backend`](bluffline_room::Backend) for rooms, results and bans and a
//! [`Gateway`](bluffline_room::Gateway) for reaching connections.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bluffline::prelude::*;
//!
//! init_tracing();
//! let host = BlufflineBuilder::new()
//!     .config(EngineConfig::default())
//!     .build(my_backend, my_gateway);
//! let _clock = host.spawn_clock();
//!
//! host.connect(player, connection).await;
//! host.activate(game_id).await?;
//! host.dispatch(game_id, player, ClientMessage::Pass).await?;
//! ```

mod config;
mod error;
mod host;
mod logging;

pub use config::EngineConfig;
pub use error::BlufflineError;
pub use host::{Bluffline, BlufflineBuilder};
pub use logging::{DEFAULT_FILTER, init_tracing};

pub use bluffline_engine as engine;
pub use bluffline_presence as presence;
pub use bluffline_protocol as protocol;
pub use bluffline_room as room;
pub use bluffline_tick as tick;

/// Everything a host needs in one import.
pub mod prelude {
    pub use crate::{Bluffline, BlufflineBuilder, BlufflineError, EngineConfig, init_tracing};
    pub use bluffline_engine::{
        ActionKind, Card, ChatEntry, ClientMessage, Departure, GameConfig, GameSnapshot, Phase,
        Seat, ServerMessage,
    };
    pub use bluffline_presence::{FillEvent, Location, RoomStatus};
    pub use bluffline_protocol::{ConnectionId, GameId, PlayStatus, PlayerId, Recipient, RoomId};
    pub use bluffline_room::{Backend, BackendError, Gateway, RegistryError, Rematch};
}
