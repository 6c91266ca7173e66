//! Session actor: an isolated Tokio task that owns one [`Game`].
//!
//! Each session runs in its own task. Player events and the one-second
//! ticker meet in a single `select!` loop, so an event and a timer
//! expiry are never processed at the same time. Whatever the engine
//! returns is routed to connections through presence, and its effects
//! are carried out against the backend.

use std::sync::Arc;

use bluffline_engine::{
    ChatEntry, ClientMessage, Departure, Effect, Game, GameSnapshot, Outbox, ServerMessage,
};
use bluffline_presence::{Location, PresenceRegistry};
use bluffline_protocol::{GameId, PlayStatus, PlayerId, Recipient, RoomId};
use bluffline_tick::Ticker;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::{Backend, BackendError, Gateway, RegistryError, Rematch};

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    /// An event from a seated player.
    Event {
        sender: PlayerId,
        message: ClientMessage,
    },

    /// Removal ordered from outside the game (ban, account deletion).
    ForceRemove {
        player: PlayerId,
        departure: Departure,
    },

    Snapshot {
        reply: oneshot::Sender<GameSnapshot>,
    },

    ChatHistory {
        reply: oneshot::Sender<Vec<ChatEntry>>,
    },

    ActionHistory {
        reply: oneshot::Sender<Vec<String>>,
    },

    /// Stops the actor; all of its timers go with it.
    Shutdown,
}

/// Handle to a running session actor.
///
/// Cheap to clone. The [`SessionRegistry`](crate::SessionRegistry) holds
/// one per live game.
#[derive(Clone)]
pub struct SessionHandle {
    game_id: GameId,
    room_id: RoomId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has stopped, either because the game ended or
    /// because it was shut down.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Forwards a player event (fire-and-forget).
    pub async fn send(&self, sender: PlayerId, message: ClientMessage) -> Result<(), RegistryError> {
        self.command(SessionCommand::Event { sender, message }).await
    }

    pub async fn force_remove(
        &self,
        player: PlayerId,
        departure: Departure,
    ) -> Result<(), RegistryError> {
        self.command(SessionCommand::ForceRemove { player, departure })
            .await
    }

    pub async fn snapshot(&self) -> Result<GameSnapshot, RegistryError> {
        let (reply, response) = oneshot::channel();
        self.command(SessionCommand::Snapshot { reply }).await?;
        response
            .await
            .map_err(|_| RegistryError::Unavailable(self.game_id))
    }

    pub async fn chat_history(&self) -> Result<Vec<ChatEntry>, RegistryError> {
        let (reply, response) = oneshot::channel();
        self.command(SessionCommand::ChatHistory { reply }).await?;
        response
            .await
            .map_err(|_| RegistryError::Unavailable(self.game_id))
    }

    pub async fn action_history(&self) -> Result<Vec<String>, RegistryError> {
        let (reply, response) = oneshot::channel();
        self.command(SessionCommand::ActionHistory { reply }).await?;
        response
            .await
            .map_err(|_| RegistryError::Unavailable(self.game_id))
    }

    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        self.command(SessionCommand::Shutdown).await
    }

    async fn command(&self, command: SessionCommand) -> Result<(), RegistryError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| RegistryError::Unavailable(self.game_id))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor<B, G> {
    game: Game,
    ticker: Ticker,
    receiver: mpsc::Receiver<SessionCommand>,
    backend: Arc<B>,
    gateway: Arc<G>,
    presence: Arc<Mutex<PresenceRegistry>>,
}

impl<B: Backend, G: Gateway> SessionActor<B, G> {
    /// Runs until the game finishes or the actor is told to stop.
    async fn run(mut self) {
        let game_id = self.game.game_id();
        tracing::info!(%game_id, room_id = %self.game.room_id(), "session actor started");

        let mut opening = Outbox::default();
        opening.push(
            Recipient::All,
            ServerMessage::State(Box::new(self.game.snapshot())),
        );
        self.deliver(opening).await;

        while !self.game.is_finished() {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!(%game_id, "session shutting down");
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                _ = self.ticker.wait_for_tick() => {
                    let outbox = self.game.tick();
                    self.deliver(outbox).await;
                }
            }
        }

        tracing::info!(%game_id, finished = self.game.is_finished(), "session actor stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Event { sender, message } => {
                let outbox = self.game.handle(sender, message);
                self.deliver(outbox).await;
            }
            SessionCommand::ForceRemove { player, departure } => {
                let outbox = self.game.force_remove(player, departure);
                self.deliver(outbox).await;
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.game.snapshot());
            }
            SessionCommand::ChatHistory { reply } => {
                let _ = reply.send(self.game.chat_log());
            }
            SessionCommand::ActionHistory { reply } => {
                let _ = reply.send(self.game.history());
            }
            SessionCommand::Shutdown => {}
        }
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Routes messages first, then carries out effects in order.
    async fn deliver(&mut self, outbox: Outbox) {
        let Outbox { messages, effects } = outbox;

        if !messages.is_empty() {
            let presence = self.presence.lock().await;
            for (to, message) in &messages {
                self.route(&presence, *to, message);
            }
        }

        for effect in effects {
            self.apply(effect).await;
        }
    }

    /// A message addressed to one player reaches them even if they were
    /// just unseated; broadcasts reach whoever is still seated.
    fn route(&self, presence: &PresenceRegistry, to: Recipient, message: &ServerMessage) {
        match to {
            Recipient::Player(player) => self.send_to(presence, player, message),
            Recipient::All | Recipient::AllExcept(_) => {
                for player in self.game.players() {
                    if to.includes(player.id) {
                        self.send_to(presence, player.id, message);
                    }
                }
            }
        }
    }

    fn send_to(&self, presence: &PresenceRegistry, player: PlayerId, message: &ServerMessage) {
        match presence.connection_of(player) {
            Some(connection) => self.gateway.send(connection, message),
            None => tracing::trace!(%player, "player offline, message dropped"),
        }
    }

    async fn apply(&mut self, effect: Effect) {
        let result = match effect.clone() {
            Effect::RecordBan { player, minutes } => {
                tracing::info!(game_id = %self.game.game_id(), %player, minutes, "recording ban");
                self.backend.record_ban(player, minutes).await
            }
            Effect::RemoveFromRoom { room, player } => {
                self.backend.remove_from_room(room, player).await
            }
            Effect::ClearLocation { player } => {
                self.presence.lock().await.clear_location(player);
                Ok(())
            }
            Effect::RecordResult { player, won } => self.backend.record_result(player, won).await,
            Effect::FinishGame { room, game } => self.finish(room, game).await,
            Effect::CreateRematch { owner, players } => {
                self.rematch(owner, players).await;
                Ok(())
            }
        };

        if let Err(error) = result {
            tracing::warn!(
                game_id = %self.game.game_id(),
                ?effect,
                %error,
                "backend call failed, continuing"
            );
        }
    }

    async fn finish(&mut self, room: RoomId, game: GameId) -> Result<(), BackendError> {
        {
            let mut presence = self.presence.lock().await;
            for player in self.game.players() {
                presence.clear_location(player.id);
            }
        }
        let status = self.backend.set_play_status(room, PlayStatus::Finished).await;
        let record = self.backend.finish_game(game).await;
        status.and(record)
    }

    async fn rematch(&mut self, owner: PlayerId, players: Vec<PlayerId>) {
        let game_id = self.game.game_id();
        match self.backend.create_rematch(owner, players.clone()).await {
            Ok(Rematch {
                room_id,
                game_id: next,
            }) => {
                tracing::info!(%game_id, %owner, %room_id, next_game = %next, "rematch created");
                let notice = ServerMessage::RedirectToNewGame {
                    room_id,
                    game_id: next,
                };
                let mut presence = self.presence.lock().await;
                for player in players {
                    presence.set_location(player, Location::game(room_id, next));
                    self.send_to(&presence, player, &notice);
                }
            }
            Err(error) => {
                tracing::warn!(%game_id, %error, "rematch failed, sending players home");
                let presence = self.presence.lock().await;
                for player in players {
                    self.send_to(&presence, player, &ServerMessage::RedirectToHomepage);
                }
            }
        }
    }
}

/// Spawns a session actor for a freshly dealt game.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_session<B: Backend, G: Gateway>(
    game: Game,
    backend: Arc<B>,
    gateway: Arc<G>,
    presence: Arc<Mutex<PresenceRegistry>>,
    channel_size: usize,
) -> SessionHandle {
    let (sender, receiver) = mpsc::channel(channel_size.max(1));
    let handle = SessionHandle {
        game_id: game.game_id(),
        room_id: game.room_id(),
        sender,
    };

    let actor = SessionActor {
        game,
        ticker: Ticker::every_second(),
        receiver,
        backend,
        gateway,
        presence,
    };
    tokio::spawn(actor.run());

    handle
}
