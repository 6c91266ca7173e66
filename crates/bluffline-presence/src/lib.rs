//! Presence and room liveness for Bluffline.
//!
//! This crate keeps the state that outlives any single session:
//!
//! 1. **Presence**: which connection each online player holds
//!    ([`PresenceRegistry`])
//! 2. **Locations**: which room and session each player belongs to, so
//!    a reloaded client can be sent back ([`Location`], [`PresenceRegistry::resume`])
//! 3. **Fill countdowns**: the short countdown a full room runs before
//!    play starts ([`FillCountdowns`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)      ← routes engine output through presence
//!     ↕
//! Presence (this crate)   ← connections, locations, fill countdowns
//!     ↕
//! Protocol (below)        ← PlayerId, RoomId, GameId, ConnectionId
//! ```

mod countdown;
mod presence;

pub use countdown::{FillConfig, FillCountdowns, FillEvent};
pub use presence::{Location, PresenceRegistry, RoomStatus};
