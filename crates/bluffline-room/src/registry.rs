//! Session registry: creates sessions on demand, routes events to them and
//! disposes of them.

use std::collections::HashMap;
use std::sync::Arc;

use bluffline_engine::{ChatEntry, ClientMessage, Departure, Game, GameConfig, GameSnapshot};
use bluffline_presence::{Location, PresenceRegistry};
use bluffline_protocol::{GameId, PlayStatus, PlayerId};
use tokio::sync::Mutex;

use crate::session::spawn_session;
use crate::{Backend, Gateway, RegistryError, SessionHandle};

/// Default command channel size for session actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Deals new sessions without touching the registry.
///
/// Obtained from [`SessionRegistry::provisioner`]. Preparing a game makes
/// every backend call activation needs, so the registry itself is only
/// borrowed again to [`install`](SessionRegistry::install) the result.
pub struct Provisioner<B> {
    backend: Arc<B>,
    presence: Arc<Mutex<PresenceRegistry>>,
    game_config: GameConfig,
}

impl<B> Clone for Provisioner<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            presence: Arc::clone(&self.presence),
            game_config: self.game_config.clone(),
        }
    }
}

impl<B: Backend> Provisioner<B> {
    /// Fetches the room roster, deals the game, marks the room started and
    /// records every player's location.
    pub async fn prepare(&self, game_id: GameId) -> Result<Game, RegistryError> {
        let room_id = self
            .backend
            .room_of_game(game_id)
            .await?
            .ok_or(RegistryError::NotFound(game_id))?;
        let roster = self.backend.room_roster(room_id).await?;
        if roster.is_empty() {
            return Err(RegistryError::EmptyRoster(room_id));
        }
        let players: Vec<PlayerId> = roster.iter().map(|seat| seat.id).collect();

        let game = Game::new(game_id, room_id, roster, self.game_config.clone())?;

        if let Err(error) = self
            .backend
            .set_play_status(room_id, PlayStatus::Started)
            .await
        {
            tracing::warn!(%game_id, %room_id, %error, "could not mark room started");
        }
        let mut presence = self.presence.lock().await;
        for player in players {
            presence.set_location(player, Location::game(room_id, game_id));
        }
        Ok(game)
    }
}

/// Maps each live game to its session actor.
///
/// Not thread-safe on its own; the host keeps it behind a mutex. Handles
/// can be cloned out with [`session`](Self::session) so slow calls into an
/// actor do not hold that lock.
pub struct SessionRegistry<B, G> {
    sessions: HashMap<GameId, SessionHandle>,
    backend: Arc<B>,
    gateway: Arc<G>,
    presence: Arc<Mutex<PresenceRegistry>>,
    game_config: GameConfig,
    channel_size: usize,
}

impl<B: Backend, G: Gateway> SessionRegistry<B, G> {
    pub fn new(
        backend: Arc<B>,
        gateway: Arc<G>,
        presence: Arc<Mutex<PresenceRegistry>>,
        game_config: GameConfig,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            backend,
            gateway,
            presence,
            game_config,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Sets the command channel size for sessions created from now on.
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    /// Returns the session for `game_id`, creating it on first call.
    ///
    /// A second call for a live game just returns its current snapshot.
    /// This holds `&mut self` across backend calls; a registry shared
    /// behind a lock should [`provisioner`](Self::provisioner) and
    /// [`install`](Self::install) instead.
    pub async fn activate(&mut self, game_id: GameId) -> Result<GameSnapshot, RegistryError> {
        if let Ok(handle) = self.session(game_id) {
            return handle.snapshot().await;
        }
        let game = self.provisioner().prepare(game_id).await?;
        let snapshot = game.snapshot();
        self.install(game);
        Ok(snapshot)
    }

    /// Everything needed to deal a new session, detached from the
    /// registry.
    pub fn provisioner(&self) -> Provisioner<B> {
        Provisioner {
            backend: Arc::clone(&self.backend),
            presence: Arc::clone(&self.presence),
            game_config: self.game_config.clone(),
        }
    }

    /// Spawns the actor for a dealt game and registers it.
    ///
    /// If a session for the same game went live in the meantime, the dealt
    /// game is discarded and the live session's handle is returned.
    pub fn install(&mut self, game: Game) -> SessionHandle {
        let (game_id, room_id) = (game.game_id(), game.room_id());
        if let Ok(handle) = self.session(game_id) {
            tracing::debug!(%game_id, "session already live, dealt game discarded");
            return handle;
        }

        let players = game.players().len();
        let handle = spawn_session(
            game,
            Arc::clone(&self.backend),
            Arc::clone(&self.gateway),
            Arc::clone(&self.presence),
            self.channel_size,
        );
        self.sessions.insert(game_id, handle.clone());
        tracing::info!(%game_id, %room_id, players, "session activated");
        handle
    }

    /// A handle to the live session for `game_id`.
    ///
    /// A session whose actor has already stopped is dropped here and
    /// reported as not found.
    pub fn session(&mut self, game_id: GameId) -> Result<SessionHandle, RegistryError> {
        match self.sessions.get(&game_id) {
            Some(handle) if !handle.is_closed() => Ok(handle.clone()),
            Some(_) => {
                self.sessions.remove(&game_id);
                tracing::info!(%game_id, "session ended, removed from registry");
                Err(RegistryError::NotFound(game_id))
            }
            None => Err(RegistryError::NotFound(game_id)),
        }
    }

    /// Routes a player event to its session.
    pub async fn dispatch(
        &mut self,
        game_id: GameId,
        sender: PlayerId,
        message: ClientMessage,
    ) -> Result<(), RegistryError> {
        self.session(game_id)?.send(sender, message).await
    }

    pub async fn force_remove(
        &mut self,
        game_id: GameId,
        player: PlayerId,
        departure: Departure,
    ) -> Result<(), RegistryError> {
        self.session(game_id)?.force_remove(player, departure).await
    }

    pub async fn snapshot(&mut self, game_id: GameId) -> Result<GameSnapshot, RegistryError> {
        self.session(game_id)?.snapshot().await
    }

    pub async fn chat_history(&mut self, game_id: GameId) -> Result<Vec<ChatEntry>, RegistryError> {
        self.session(game_id)?.chat_history().await
    }

    pub async fn action_history(&mut self, game_id: GameId) -> Result<Vec<String>, RegistryError> {
        self.session(game_id)?.action_history().await
    }

    /// Removes the session and stops its actor, cancelling its timers.
    pub async fn dispose(&mut self, game_id: GameId) -> Result<(), RegistryError> {
        let handle = self
            .sessions
            .remove(&game_id)
            .ok_or(RegistryError::NotFound(game_id))?;

        // An actor that already stopped on its own has nothing to shut down.
        let _ = handle.shutdown().await;

        tracing::info!(%game_id, "session disposed");
        Ok(())
    }

    /// Drops every session whose actor has stopped. Returns their ids.
    pub fn prune(&mut self) -> Vec<GameId> {
        let mut ended = Vec::new();
        self.sessions.retain(|game_id, handle| {
            if handle.is_closed() {
                ended.push(*game_id);
                false
            } else {
                true
            }
        });
        if !ended.is_empty() {
            tracing::info!(count = ended.len(), "ended sessions pruned");
        }
        ended
    }

    pub fn contains(&self, game_id: GameId) -> bool {
        self.sessions.contains_key(&game_id)
    }

    /// Number of registered sessions, including any not yet pruned.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn game_ids(&self) -> Vec<GameId> {
        self.sessions.keys().copied().collect()
    }
}
