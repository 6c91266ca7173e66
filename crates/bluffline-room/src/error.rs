//! Error types for the session layer.

use bluffline_engine::SetupError;
use bluffline_protocol::{GameId, RoomId};

/// Errors reported by a [`Backend`](crate::Backend) implementation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The store could not be reached or timed out.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The store refused the request.
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No live session exists for this game, and the backend does not
    /// know the game either.
    #[error("game {0} not found")]
    NotFound(GameId),

    /// The game's room has nobody in it.
    #[error("room {0} has an empty roster")]
    EmptyRoster(RoomId),

    /// The session's command channel is full or closed.
    #[error("session {0} is unavailable")]
    Unavailable(GameId),

    /// A collaborator call needed to set the session up failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The roster could not be dealt into a game.
    #[error(transparent)]
    Setup(#[from] SetupError),
}
