//! One session: the table, the deck, the phase and its countdowns.
//!
//! [`Game`] is a synchronous state machine. The host feeds it player
//! events through [`Game::handle`] and one-second ticks through
//! [`Game::tick`]; each call runs to completion and hands back an
//! [`Outbox`]. Events that are not legal in the current state are dropped
//! without touching anything.
//!
//! Every phase change goes through `Game::enter`, which bumps the epoch
//! and re-arms the bank with exactly the timer that guards the new phase.
//! A countdown that fires for an epoch the session has already left is
//! ignored.

mod resolver;
#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use bluffline_protocol::{GameId, PlayerId, Recipient, RoomId};
use bluffline_tick::TimerBank;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, trace};

use crate::{
    BoundedLog, ChatEntry, ClientMessage, CurrentAction, Deck, Effect, GameConfig, GameSnapshot,
    Outbox, Phase, Player, PlayerStatus, Seat, ServerMessage, TimerSnapshot, TurnRing,
};

/// Seats at one table.
pub const MAX_PLAYERS: usize = 6;
pub const MIN_PLAYERS: usize = 2;
/// Cards dealt to each player.
pub const HAND_SIZE: usize = 2;

/// Why a roster could not be dealt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("{count} players is below the minimum of {min}", min = MIN_PLAYERS)]
    NotEnoughPlayers { count: usize },

    #[error("{count} players is above the maximum of {max}", max = MAX_PLAYERS)]
    TooManyPlayers { count: usize },

    #[error("player {0} is seated twice")]
    DuplicatePlayer(PlayerId),
}

/// How a player came to leave a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Walked away on their own.
    Left,
    /// Let too many turns time out in a row.
    Idle,
    /// Banned by an administrator.
    Banned,
    /// Account deleted by an administrator.
    Deleted,
}

/// Result of validating a player event. The error is the reason it was
/// ignored, for the debug log only.
type Verdict = Result<(), &'static str>;

pub struct Game {
    game_id: GameId,
    room_id: RoomId,
    config: GameConfig,
    /// In seating order.
    players: Vec<Player>,
    ring: TurnRing,
    deck: Deck,
    turn: Option<PlayerId>,
    action: Option<CurrentAction>,
    phase: Phase,
    passed: BTreeSet<PlayerId>,
    timers: TimerBank,
    epoch: u64,
    chat: BoundedLog<ChatEntry>,
    history: BoundedLog<String>,
    winner: Option<PlayerId>,
    rng: StdRng,
    outbox: Outbox,
}

impl Game {
    /// Shuffles the deck, draws the seating order, deals two cards each
    /// and starts the first turn.
    pub fn new(
        game_id: GameId,
        room_id: RoomId,
        roster: Vec<Seat>,
        config: GameConfig,
    ) -> Result<Self, SetupError> {
        let count = roster.len();
        if count < MIN_PLAYERS {
            return Err(SetupError::NotEnoughPlayers { count });
        }
        if count > MAX_PLAYERS {
            return Err(SetupError::TooManyPlayers { count });
        }
        let mut seen = BTreeSet::new();
        for seat in &roster {
            if !seen.insert(seat.id) {
                return Err(SetupError::DuplicatePlayer(seat.id));
            }
        }

        let config = config.validated();
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut deck = Deck::full();
        deck.shuffle(&mut rng);

        let mut players: Vec<Player> = roster
            .into_iter()
            .map(|seat| Player::new(seat, config.starting_coins))
            .collect();
        players.shuffle(&mut rng);
        for _ in 0..HAND_SIZE {
            for player in players.iter_mut() {
                if let Some(card) = deck.draw() {
                    player.hand.push(card);
                }
            }
        }

        let ring = TurnRing::new(players.iter().map(|p| p.id).collect());
        let turn = ring.first(|_| true);

        let mut game = Self {
            game_id,
            room_id,
            chat: BoundedLog::new(config.chat_capacity),
            history: BoundedLog::new(config.history_capacity),
            config,
            players,
            ring,
            deck,
            turn,
            action: None,
            phase: Phase::AwaitingTurnAction,
            passed: BTreeSet::new(),
            timers: TimerBank::new(),
            epoch: 0,
            winner: None,
            rng,
            outbox: Outbox::default(),
        };
        game.enter(Phase::AwaitingTurnAction);

        info!(%game_id, %room_id, players = count, first = ?turn, "game dealt");
        Ok(game)
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Applies one event from `sender`.
    pub fn handle(&mut self, sender: PlayerId, message: ClientMessage) -> Outbox {
        if self.is_finished() {
            debug!(game_id = %self.game_id, player = %sender, "event after game end ignored");
            return Outbox::default();
        }

        let verdict = match message {
            ClientMessage::DeclareAction { action, target } => {
                self.declare_action(sender, action, target)
            }
            ClientMessage::Block { action, card } => self.block(sender, action, card),
            ClientMessage::Challenge => self.challenge(sender),
            ClientMessage::ShowCard { card } => self.show_card(sender, card),
            ClientMessage::DropCard { card } => self.drop_card(sender, card),
            ClientMessage::ConfirmExchange { keep } => self.confirm_exchange(sender, keep),
            ClientMessage::Pass => self.pass(sender),
            ClientMessage::Leave => self.leave(sender),
            ClientMessage::Chat { message } => return self.post_chat(sender, &message),
        };

        match verdict {
            Ok(()) => self.flush(true),
            Err(reason) => {
                debug!(
                    game_id = %self.game_id,
                    player = %sender,
                    phase = self.phase.name(),
                    reason,
                    "event ignored"
                );
                Outbox::default()
            }
        }
    }

    /// Advances every countdown by one second and resolves whatever
    /// expired.
    pub fn tick(&mut self) -> Outbox {
        if self.is_finished() {
            return Outbox::default();
        }
        let running = self.timers.armed().next().is_some();
        let epoch = self.epoch;
        for expired in self.timers.tick() {
            if expired.epoch != self.epoch {
                trace!(game_id = %self.game_id, kind = %expired.kind, "stale expiry ignored");
                continue;
            }
            debug!(game_id = %self.game_id, kind = %expired.kind, phase = self.phase.name(), "timer expired");
            self.on_expired(expired.kind);
        }
        if self.epoch == epoch {
            self.prompt_drop();
        }
        self.flush(running)
    }

    /// Removes `player` on behalf of an administrator or the host.
    pub fn force_remove(&mut self, player: PlayerId, departure: Departure) -> Outbox {
        if self.is_finished() || self.player(player).is_none() {
            debug!(game_id = %self.game_id, %player, "force removal of unseated player ignored");
            return Outbox::default();
        }
        self.remove_player(player, departure);
        self.flush(true)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.game_id,
            room_id: self.room_id,
            phase: self.phase.clone(),
            players: self.players.clone(),
            turn: self.turn,
            action: self.action.clone(),
            passed: self.passed.iter().copied().collect(),
            deck_size: self.deck.len(),
            timers: TimerSnapshot::from(&self.timers),
            winner: self.winner,
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn turn(&self) -> Option<PlayerId> {
        self.turn
    }

    pub fn action(&self) -> Option<&CurrentAction> {
        self.action.as_ref()
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn timers(&self) -> &TimerBank {
        &self.timers
    }

    pub fn chat_log(&self) -> Vec<ChatEntry> {
        self.chat.to_vec()
    }

    /// Most recent history lines, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.to_vec()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    /// Every card the session accounts for: hands, deck, and an exchange
    /// draw that has not been settled yet. Always [`Card::DECK_SIZE`].
    ///
    /// [`Card::DECK_SIZE`]: crate::Card::DECK_SIZE
    pub fn card_count(&self) -> usize {
        let in_hands: usize = self.players.iter().map(|p| p.hand.len()).sum();
        let pending = match &self.phase {
            Phase::AwaitingExchangeSelection(request) => request.drawn.len(),
            _ => 0,
        };
        in_hands + self.deck.len() + pending
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn seat_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn is_alive(&self, id: PlayerId) -> bool {
        self.player(id).is_some_and(Player::is_alive)
    }

    fn alive(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id)
            .collect()
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.player(id)
            .map_or_else(|| id.to_string(), |p| p.name.clone())
    }

    fn emit(&mut self, to: Recipient, message: ServerMessage) {
        self.outbox.push(to, message);
    }

    /// Appends a history line and broadcasts it.
    fn record(&mut self, entry: String) {
        self.history.push(entry.clone());
        self.emit(Recipient::All, ServerMessage::History { entry });
    }

    fn flush(&mut self, changed: bool) -> Outbox {
        if changed {
            let snapshot = self.snapshot();
            self.emit(Recipient::All, ServerMessage::State(Box::new(snapshot)));
        }
        std::mem::take(&mut self.outbox)
    }

    /// Moves to `next` and arms the one timer that guards it.
    ///
    /// Leaving an exchange selection that nobody settled puts the drawn
    /// cards back into the deck.
    fn enter(&mut self, next: Phase) {
        self.epoch += 1;
        self.timers.disarm_all();
        if let Some(kind) = next.timer() {
            let secs = self.config.seconds_for(kind);
            self.timers.arm(kind, secs, self.epoch);
        }
        let previous = std::mem::replace(&mut self.phase, next);
        if let Phase::AwaitingExchangeSelection(request) = previous {
            if !request.token.is_spent() {
                for card in request.drawn {
                    self.deck.put_back(card);
                }
                self.deck.shuffle(&mut self.rng);
            }
        }
        trace!(game_id = %self.game_id, phase = self.phase.name(), epoch = self.epoch, "phase entered");
    }

    // -----------------------------------------------------------------------
    // Turn order and game end
    // -----------------------------------------------------------------------

    fn begin_turn(&mut self, player: PlayerId) {
        self.action = None;
        self.passed.clear();
        self.turn = Some(player);
        self.enter(Phase::AwaitingTurnAction);
    }

    /// Clears the action and hands the turn to the next alive seat, unless
    /// the game has been won.
    fn advance_turn(&mut self) {
        if self.check_winner() {
            return;
        }
        let next = match self.turn {
            Some(current) => self.ring.next_after(current, |p| self.is_alive(p)),
            None => self.ring.first(|p| self.is_alive(p)),
        };
        match next {
            Some(player) => self.begin_turn(player),
            None => self.conclude(false),
        }
    }

    /// Ends the game if it is over. Returns `true` when play must stop.
    fn check_winner(&mut self) -> bool {
        if matches!(self.phase, Phase::AwaitingVotes | Phase::Finished) {
            return true;
        }
        if self.players.len() <= 1 {
            if let Some(last) = self.players.first().filter(|p| p.is_alive()).map(|p| p.id) {
                self.crown(last);
            }
            self.conclude(false);
            return true;
        }
        match self.alive().as_slice() {
            [winner] => {
                self.crown(*winner);
                self.enter(Phase::AwaitingVotes);
                true
            }
            [] => {
                self.conclude(false);
                true
            }
            _ => false,
        }
    }

    fn crown(&mut self, winner: PlayerId) {
        if let Some(player) = self.player_mut(winner) {
            player.is_win = true;
        }
        self.winner = Some(winner);
        self.action = None;
        self.turn = None;
        self.passed.clear();
        let name = self.name_of(winner);
        self.record(format!("{name} wins the game"));
        info!(game_id = %self.game_id, %winner, "game won");
    }

    /// Ready-up in the vote phase. Everyone still seated counts, not just
    /// the survivors.
    fn vote(&mut self, player: PlayerId) -> Verdict {
        if self.player(player).is_none() {
            return Err("not seated");
        }
        if !self.passed.insert(player) {
            return Err("already ready");
        }
        debug!(
            game_id = %self.game_id,
            %player,
            ready = self.passed.len(),
            seated = self.players.len(),
            "player ready"
        );
        if self.players.iter().all(|p| self.passed.contains(&p.id)) {
            self.conclude(true);
        }
        Ok(())
    }

    /// Records results and closes the session. With `rematch`, asks the
    /// host for a follow-on game; otherwise sends everyone home.
    fn conclude(&mut self, rematch: bool) {
        self.outbox.effect(Effect::FinishGame {
            room: self.room_id,
            game: self.game_id,
        });
        for player in &self.players {
            self.outbox.effect(Effect::RecordResult {
                player: player.id,
                won: player.is_win,
            });
        }

        let owner = self.winner.filter(|w| self.player(*w).is_some());
        match (rematch, owner) {
            (true, Some(owner)) => {
                let players = self.players.iter().map(|p| p.id).collect();
                self.outbox.effect(Effect::CreateRematch { owner, players });
            }
            _ => {
                for player in &self.players {
                    self.outbox
                        .push(Recipient::Player(player.id), ServerMessage::RedirectToHomepage);
                }
            }
        }

        info!(game_id = %self.game_id, winner = ?self.winner, rematch, "game concluded");
        self.action = None;
        self.turn = None;
        self.enter(Phase::Finished);
    }

    // -----------------------------------------------------------------------
    // Departures
    // -----------------------------------------------------------------------

    /// Unseats `id` and returns their hand to the deck.
    fn take_seat(&mut self, id: PlayerId) -> Option<Player> {
        let pos = self.seat_of(id)?;
        let player = self.players.remove(pos);
        if !player.hand.is_empty() {
            for card in &player.hand {
                self.deck.put_back(*card);
            }
            self.deck.shuffle(&mut self.rng);
        }
        self.ring.remove(id);
        self.passed.remove(&id);
        Some(player)
    }

    fn leave(&mut self, player: PlayerId) -> Verdict {
        if self.player(player).is_none() {
            return Err("not seated");
        }
        self.remove_player(player, Departure::Left);
        Ok(())
    }

    /// Unseats `id` mid-game and repairs whatever they were part of.
    fn remove_player(&mut self, id: PlayerId, departure: Departure) {
        let voting = matches!(self.phase, Phase::AwaitingVotes);
        let held_turn = self.turn == Some(id);
        let involved = held_turn
            || self.action.as_ref().is_some_and(|a| a.involves(id))
            || self.phase.waits_on(id);
        let successor = if held_turn {
            self.ring.next_after(id, |p| p != id && self.is_alive(p))
        } else {
            None
        };

        let Some(seat) = self.take_seat(id) else {
            return;
        };
        let name = seat.name;
        match departure {
            Departure::Left => {
                self.outbox.effect(Effect::RecordResult {
                    player: id,
                    won: voting && seat.is_win,
                });
                self.record(format!("{name} left the game"));
            }
            Departure::Idle => {
                self.outbox.effect(Effect::RecordBan {
                    player: id,
                    minutes: self.config.ban_minutes,
                });
                self.outbox.effect(Effect::RemoveFromRoom {
                    room: self.room_id,
                    player: id,
                });
                self.emit(Recipient::Player(id), ServerMessage::RedirectToBan);
                self.record(format!("{name} was banned for idling"));
            }
            Departure::Banned => self.record(format!("{name} was banned by an administrator")),
            Departure::Deleted => self.record(format!("{name} was deleted by an administrator")),
        }
        self.outbox.effect(Effect::ClearLocation { player: id });
        info!(game_id = %self.game_id, player = %id, ?departure, "player removed");

        // Any departure closes the vote without a rematch.
        if voting {
            self.conclude(false);
            return;
        }

        if self.check_winner() {
            return;
        }
        if involved {
            match successor {
                Some(next) => self.begin_turn(next),
                None => self.advance_turn(),
            }
        } else if self.phase.is_response_window() && self.window_settled() {
            self.resolve_window();
        }
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    fn post_chat(&mut self, sender: PlayerId, message: &str) -> Outbox {
        let message = message.trim();
        let Some(player) = self.player(sender) else {
            debug!(game_id = %self.game_id, player = %sender, "chat from unseated player ignored");
            return Outbox::default();
        };
        if message.is_empty() {
            return Outbox::default();
        }
        let entry = ChatEntry::now(player.name.clone(), message);
        self.chat.push(entry.clone());
        self.emit(Recipient::All, ServerMessage::Chat(entry));
        self.flush(false)
    }

    fn eliminate(&mut self, pos: usize) {
        let player = &mut self.players[pos];
        player.status = PlayerStatus::Eliminated;
        let (id, name) = (player.id, player.name.clone());
        self.record(format!("{name} is out of the game"));
        info!(game_id = %self.game_id, player = %id, "player eliminated");
    }
}
