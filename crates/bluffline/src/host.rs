//! `Bluffline` builder and host.
//!
//! This is the entry point for hosting Bluffline. It ties together the
//! layers: presence → session registry → session actors, plus the lobby
//! clock that drives room-fill countdowns.

use std::sync::Arc;

use bluffline_engine::{ChatEntry, ClientMessage, Departure, GameSnapshot};
use bluffline_presence::{FillCountdowns, FillEvent, Location, PresenceRegistry};
use bluffline_protocol::{ConnectionId, GameId, PlayerId, RoomId};
use bluffline_room::{Backend, Gateway, SessionHandle, SessionRegistry};
use bluffline_tick::Ticker;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{BlufflineError, EngineConfig};

/// Shared host state.
///
/// Wrapped in `Arc` so it can be cheaply cloned into the lobby clock task.
struct HostState<B, G> {
    registry: Mutex<SessionRegistry<B, G>>,
    presence: Arc<Mutex<PresenceRegistry>>,
    fills: Mutex<FillCountdowns>,
    backend: Arc<B>,
    gateway: Arc<G>,
}

impl<B: Backend, G: Gateway> HostState<B, G> {
    /// Sends a fill event to every online member of its room.
    async fn broadcast_fill(&self, event: FillEvent) {
        let room = event.room();
        match self.backend.room_roster(room).await {
            Ok(roster) => self.send_fill(roster.iter().map(|seat| seat.id), &event).await,
            Err(error) => {
                tracing::warn!(%room, %error, "could not load roster, countdown event dropped");
            }
        }
    }

    async fn send_fill(&self, players: impl Iterator<Item = PlayerId>, event: &FillEvent) {
        let presence = self.presence.lock().await;
        for player in players {
            if let Some(connection) = presence.connection_of(player) {
                self.gateway.send_fill(connection, event);
            }
        }
    }
}

/// Builder for configuring a Bluffline host.
///
/// # Example
///
/// ```rust,ignore
/// use bluffline::prelude::*;
///
/// let host = BlufflineBuilder::new()
///     .config(EngineConfig::from_json(&text)?)
///     .build(my_backend, my_gateway);
/// let _clock = host.spawn_clock();
/// let snapshot = host.activate(game_id).await?;
/// ```
#[derive(Debug, Default)]
pub struct BlufflineBuilder {
    config: EngineConfig,
}

impl BlufflineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the host around the given collaborators.
    pub fn build<B: Backend, G: Gateway>(self, backend: B, gateway: G) -> Bluffline<B, G> {
        let config = self.config.validated();
        let backend = Arc::new(backend);
        let gateway = Arc::new(gateway);
        let presence = Arc::new(Mutex::new(PresenceRegistry::new()));

        let registry = SessionRegistry::new(
            Arc::clone(&backend),
            Arc::clone(&gateway),
            Arc::clone(&presence),
            config.game.clone(),
        )
        .with_channel_size(config.session_channel_size);

        let state = Arc::new(HostState {
            registry: Mutex::new(registry),
            presence,
            fills: Mutex::new(FillCountdowns::new(config.fill())),
            backend,
            gateway,
        });

        tracing::info!(
            room_capacity = config.room_capacity,
            room_fill_secs = config.room_fill_secs,
            "bluffline host ready"
        );
        Bluffline { config, state }
    }
}

/// A running Bluffline host.
///
/// Cheap to clone; every clone talks to the same sessions.
pub struct Bluffline<B, G> {
    config: EngineConfig,
    state: Arc<HostState<B, G>>,
}

impl<B, G> Clone for Bluffline<B, G> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: Backend, G: Gateway> Bluffline<B, G> {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts the lobby clock: one tick per second advances every room-fill
    /// countdown and drops sessions whose game has ended.
    ///
    /// Runs until the returned handle is aborted.
    pub fn spawn_clock(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut ticker = Ticker::every_second();
            loop {
                ticker.wait_for_tick().await;

                let events = state.fills.lock().await.tick();
                for event in events {
                    state.broadcast_fill(event).await;
                }

                let ended = state.registry.lock().await.prune();
                for game_id in ended {
                    tracing::debug!(%game_id, "ended session released");
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    /// Registers a connection. Returns the one it replaced, if any.
    pub async fn connect(&self, player: PlayerId, connection: ConnectionId) -> Option<ConnectionId> {
        self.state.presence.lock().await.connect(player, connection)
    }

    pub async fn disconnect(&self, player: PlayerId, connection: ConnectionId) -> bool {
        self.state.presence.lock().await.disconnect(player, connection)
    }

    pub async fn online_count(&self) -> usize {
        self.state.presence.lock().await.online_count()
    }

    pub async fn set_location(&self, player: PlayerId, location: Location) {
        self.state.presence.lock().await.set_location(player, location);
    }

    pub async fn clear_location(&self, player: PlayerId) -> bool {
        self.state.presence.lock().await.clear_location(player)
    }

    /// Where a returning player should be sent, if anywhere.
    pub async fn resume(&self, player: PlayerId) -> Result<Option<Location>, BlufflineError> {
        let room = self
            .state
            .presence
            .lock()
            .await
            .location_of(player)
            .and_then(|location| location.room_id);

        let status = match room {
            Some(room) => self.state.backend.room_status(room).await?,
            None => None,
        };

        let resumed = self
            .state
            .presence
            .lock()
            .await
            .resume(player, |_| status);
        tracing::debug!(%player, ?resumed, "resume resolved");
        Ok(resumed)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Creates the session for `game` on first call; afterwards returns its
    /// current snapshot.
    ///
    /// The registry lock is only held to look the game up and to install
    /// it, never across a backend call.
    pub async fn activate(&self, game: GameId) -> Result<GameSnapshot, BlufflineError> {
        let (live, provisioner) = {
            let mut registry = self.state.registry.lock().await;
            (registry.session(game).ok(), registry.provisioner())
        };
        let handle = match live {
            Some(handle) => handle,
            None => {
                let dealt = provisioner.prepare(game).await?;
                self.state.registry.lock().await.install(dealt)
            }
        };
        Ok(handle.snapshot().await?)
    }

    /// Routes a player event to its session.
    pub async fn dispatch(
        &self,
        game: GameId,
        player: PlayerId,
        message: ClientMessage,
    ) -> Result<(), BlufflineError> {
        self.session(game).await?.send(player, message).await?;
        Ok(())
    }

    /// Removes a player on behalf of an administrator.
    pub async fn force_remove(
        &self,
        game: GameId,
        player: PlayerId,
        departure: Departure,
    ) -> Result<(), BlufflineError> {
        tracing::info!(%game, %player, ?departure, "force-removing player");
        self.session(game)
            .await?
            .force_remove(player, departure)
            .await?;
        Ok(())
    }

    pub async fn snapshot(&self, game: GameId) -> Result<GameSnapshot, BlufflineError> {
        Ok(self.session(game).await?.snapshot().await?)
    }

    pub async fn chat_history(&self, game: GameId) -> Result<Vec<ChatEntry>, BlufflineError> {
        Ok(self.session(game).await?.chat_history().await?)
    }

    pub async fn action_history(&self, game: GameId) -> Result<Vec<String>, BlufflineError> {
        Ok(self.session(game).await?.action_history().await?)
    }

    pub async fn dispose(&self, game: GameId) -> Result<(), BlufflineError> {
        self.state.registry.lock().await.dispose(game).await?;
        Ok(())
    }

    /// Clones the session handle out so the registry lock is not held
    /// while the actor works.
    async fn session(&self, game: GameId) -> Result<SessionHandle, BlufflineError> {
        Ok(self.state.registry.lock().await.session(game)?)
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    /// Re-checks a waiting room's fill countdown after someone joined or
    /// left.
    pub async fn roster_changed(&self, room: RoomId) -> Result<(), BlufflineError> {
        let roster = self.state.backend.room_roster(room).await?;
        let event = self
            .state
            .fills
            .lock()
            .await
            .roster_changed(room, roster.len());
        if let Some(event) = event {
            self.state
                .send_fill(roster.iter().map(|seat| seat.id), &event)
                .await;
        }
        Ok(())
    }

    /// Tells `player` where the room's countdown stands. Returns whether
    /// one is running.
    pub async fn request_countdown(&self, room: RoomId, player: PlayerId) -> bool {
        let Some(event) = self.state.fills.lock().await.current(room) else {
            return false;
        };
        self.state.send_fill(std::iter::once(player), &event).await;
        true
    }

    /// Cancels the room's countdown and tells its members.
    pub async fn stop_countdown(&self, room: RoomId) -> bool {
        let Some(event) = self.state.fills.lock().await.stop(room) else {
            return false;
        };
        self.state.broadcast_fill(event).await;
        true
    }
}
