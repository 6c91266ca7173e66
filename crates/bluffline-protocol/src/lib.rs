//! Shared vocabulary for Bluffline.
//!
//! Every other crate speaks in terms of these identifiers:
//!
//! - [`PlayerId`]: a participant
//! - [`RoomId`]: the pre-game room that owns a roster
//! - [`GameId`]: one played match (one engine session)
//! - [`ConnectionId`]: a reachable client connection
//! - [`Recipient`]: who an outbound message is addressed to

mod types;

pub use types::{ConnectionId, GameId, PlayStatus, PlayerId, Recipient, RoomId};
