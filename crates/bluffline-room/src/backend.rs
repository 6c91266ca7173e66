//! The collaborators a session talks to.
//!
//! [`Backend`] is the persistent store for rooms, results and bans;
//! [`Gateway`] is whatever carries messages to client connections. Both
//! are implemented by the host. Methods return `Send` futures so session
//! actors generic over them can be spawned onto the runtime.

use std::future::Future;

use bluffline_engine::{Seat, ServerMessage};
use bluffline_presence::{FillEvent, RoomStatus};
use bluffline_protocol::{ConnectionId, GameId, PlayStatus, PlayerId, RoomId};

use crate::BackendError;

/// The room and session a rematch was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rematch {
    pub room_id: RoomId,
    pub game_id: GameId,
}

/// Room, result and ban storage.
///
/// Every write is best-effort from the session's point of view: a failure
/// is logged and play carries on.
pub trait Backend: Send + Sync + 'static {
    /// The room a game was created for, or `None` if the game is unknown.
    fn room_of_game(
        &self,
        game: GameId,
    ) -> impl Future<Output = Result<Option<RoomId>, BackendError>> + Send;

    /// The room's members in join order.
    fn room_roster(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<Seat>, BackendError>> + Send;

    /// The room's play status, or `None` if the room no longer exists.
    fn room_status(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Option<RoomStatus>, BackendError>> + Send;

    fn remove_from_room(
        &self,
        room: RoomId,
        player: PlayerId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn set_play_status(
        &self,
        room: RoomId,
        status: PlayStatus,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Closes the game record.
    fn finish_game(&self, game: GameId) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Opens a follow-on room owned by `owner` with `players` already in it.
    fn create_rematch(
        &self,
        owner: PlayerId,
        players: Vec<PlayerId>,
    ) -> impl Future<Output = Result<Rematch, BackendError>> + Send;

    fn record_result(
        &self,
        player: PlayerId,
        won: bool,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn record_ban(
        &self,
        player: PlayerId,
        minutes: u32,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Delivers outbound messages to client connections.
///
/// Delivery is fire-and-forget. A connection that has gone away simply
/// misses the message; the next snapshot brings it back in sync.
pub trait Gateway: Send + Sync + 'static {
    fn send(&self, connection: ConnectionId, message: &ServerMessage);

    /// Delivers a room-fill countdown event to one room member.
    fn send_fill(&self, connection: ConnectionId, event: &FillEvent);
}
