//! The action resolver: declarations, blocks, challenges, reveals, card
//! loss, exchanges and the timeouts that stand in for each of them.

use bluffline_protocol::{PlayerId, Recipient};
use bluffline_tick::TimerKind;
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use super::{Departure, Game, Verdict};
use crate::rules::{
    EXCHANGE_DRAW, FOREIGN_AID_GAIN, FORCED_COUP_THRESHOLD, INCOME_GAIN, STEAL_AMOUNT, TAX_GAIN,
};
use crate::{
    ActionKind, Block, Card, Challenge, ClaimSource, CurrentAction, DropReason, DropRequest,
    ExchangeRequest, Phase, ServerMessage,
};

impl Game {
    // -----------------------------------------------------------------------
    // Declaring
    // -----------------------------------------------------------------------

    pub(super) fn declare_action(
        &mut self,
        actor: PlayerId,
        kind: ActionKind,
        target: Option<PlayerId>,
    ) -> Verdict {
        if !matches!(self.phase, Phase::AwaitingTurnAction) {
            return Err("not waiting for a turn action");
        }
        if self.turn != Some(actor) {
            return Err("not this player's turn");
        }
        if self.action.is_some() {
            return Err("an action is already in flight");
        }
        let coins = match self.player(actor) {
            Some(p) if p.is_alive() => p.coins,
            Some(_) => return Err("actor is eliminated"),
            None => return Err("actor is not seated"),
        };

        let rule = kind.rule();
        let target = if rule.targeted {
            let target = target.ok_or("action needs a target")?;
            if target == actor {
                return Err("cannot target yourself");
            }
            match self.player(target) {
                Some(p) if p.is_alive() => {
                    if kind == ActionKind::Steal && p.coins == 0 {
                        return Err("target has nothing to steal");
                    }
                }
                _ => return Err("target is not alive"),
            }
            Some(target)
        } else {
            None
        };
        if coins < rule.cost {
            return Err("not enough coins");
        }

        if let Some(player) = self.player_mut(actor) {
            player.ban_stack = 0;
        }
        self.passed.clear();
        let name = self.name_of(actor);

        match kind {
            ActionKind::Income => {
                self.credit(actor, INCOME_GAIN);
                self.record(format!("{name} took income (+{INCOME_GAIN})"));
                self.advance_turn();
            }
            ActionKind::Coup => {
                if let Some(target) = target {
                    self.coup(actor, target);
                }
            }
            _ => {
                if let Some(player) = self.player_mut(actor) {
                    player.coins -= rule.cost;
                }
                let line = match target {
                    Some(t) => format!("{name} declared {kind} on {}", self.name_of(t)),
                    None => format!("{name} declared {kind}"),
                };
                self.record(line);
                self.action = Some(CurrentAction::new(kind, actor, target));
                self.enter(Phase::AwaitingResponse);
                self.emit(
                    Recipient::AllExcept(actor),
                    ServerMessage::ChooseBlockOrChallenge {
                        claimant: actor,
                        action: kind,
                        claim: rule.claim,
                    },
                );
            }
        }
        Ok(())
    }

    /// Pays for and launches a coup. The target must drop a card; nobody
    /// can respond.
    fn coup(&mut self, actor: PlayerId, target: PlayerId) {
        if let Some(player) = self.player_mut(actor) {
            player.coins = player.coins.saturating_sub(ActionKind::Coup.rule().cost);
        }
        let line = format!(
            "{} launched a coup against {}",
            self.name_of(actor),
            self.name_of(target)
        );
        self.record(line);
        self.action = Some(CurrentAction::new(ActionKind::Coup, actor, Some(target)));
        self.request_drop(target, DropReason::Coup);
    }

    // -----------------------------------------------------------------------
    // Responding
    // -----------------------------------------------------------------------

    pub(super) fn block(
        &mut self,
        blocker: PlayerId,
        kind: ActionKind,
        card: Option<Card>,
    ) -> Verdict {
        if !self.phase.is_response_window() {
            return Err("no response window open");
        }
        let action = self.action.as_ref().ok_or("no action to block")?;
        if action.kind != kind {
            return Err("block names a different action");
        }
        if action.is_blocked() {
            return Err("action is already blocked");
        }
        if blocker == action.actor {
            return Err("cannot block your own action");
        }
        if !self.is_alive(blocker) {
            return Err("blocker is not alive");
        }
        let card = match (card, kind.rule().blockers) {
            (_, []) => return Err("action cannot be blocked"),
            (Some(card), _) => card,
            (None, [only]) => *only,
            (None, _) => return Err("blocking card must be named"),
        };
        if !kind.can_block_with(card) {
            return Err("card does not block this action");
        }

        let actor = action.actor;
        let reopened = if matches!(self.phase, Phase::AwaitingSecondResponse) {
            Phase::AwaitingSecondResponse
        } else {
            Phase::AwaitingResponse
        };
        if let Some(action) = self.action.as_mut() {
            action.block = Some(Block { by: blocker, card });
        }
        self.passed.clear();
        let line = format!(
            "{} blocked {}'s {kind} with a {card}",
            self.name_of(blocker),
            self.name_of(actor)
        );
        self.record(line);
        self.enter(reopened);
        self.emit(
            Recipient::AllExcept(blocker),
            ServerMessage::ChooseBlockOrChallenge {
                claimant: blocker,
                action: kind,
                claim: Some(card),
            },
        );
        Ok(())
    }

    pub(super) fn challenge(&mut self, challenger: PlayerId) -> Verdict {
        if !self.phase.is_response_window() {
            return Err("no response window open");
        }
        let action = self.action.as_ref().ok_or("no action to challenge")?;
        let (claimant, claim, source) = match action.block {
            Some(block) => (block.by, block.card, ClaimSource::Blocker),
            None if matches!(self.phase, Phase::AwaitingSecondResponse) => {
                return Err("the action's claim already held up");
            }
            None => {
                let claim = action.claim.ok_or("action makes no claim")?;
                (action.actor, claim, ClaimSource::Actor)
            }
        };
        if challenger == claimant {
            return Err("cannot challenge your own claim");
        }
        if !self.is_alive(challenger) {
            return Err("challenger is not alive");
        }
        if !self.is_alive(claimant) {
            return Err("claimant is not alive");
        }

        let line = format!(
            "{} challenged {}'s {claim}",
            self.name_of(challenger),
            self.name_of(claimant)
        );
        self.record(line);
        self.enter(Phase::AwaitingReveal(Challenge {
            challenger,
            claimant,
            claim,
            source,
        }));
        self.emit(
            Recipient::Player(claimant),
            ServerMessage::ChooseCardToShow { challenger, claim },
        );
        Ok(())
    }

    pub(super) fn pass(&mut self, player: PlayerId) -> Verdict {
        match self.phase {
            Phase::AwaitingVotes => self.vote(player),
            Phase::AwaitingResponse | Phase::AwaitingSecondResponse => {
                if !self.responders().contains(&player) {
                    return Err("not an eligible responder");
                }
                if !self.passed.insert(player) {
                    return Err("already passed");
                }
                if self.window_settled() {
                    self.resolve_window();
                }
                Ok(())
            }
            _ => Err("nothing to pass on"),
        }
    }

    /// Who may still respond in the open window.
    ///
    /// An unblocked action is answered by every survivor except the actor,
    /// a block by every survivor except the blocker. A second window on an
    /// unblocked action is the target's alone.
    pub(super) fn responders(&self) -> Vec<PlayerId> {
        let Some(action) = &self.action else {
            return Vec::new();
        };
        let excluded = match (&self.phase, action.block) {
            (_, Some(block)) => block.by,
            (Phase::AwaitingSecondResponse, None) => {
                return action.target.filter(|t| self.is_alive(*t)).into_iter().collect();
            }
            _ => action.actor,
        };
        self.players
            .iter()
            .filter(|p| p.is_alive() && p.id != excluded)
            .map(|p| p.id)
            .collect()
    }

    pub(super) fn window_settled(&self) -> bool {
        self.responders().iter().all(|p| self.passed.contains(p))
    }

    /// Closes a response window nobody contested further.
    pub(super) fn resolve_window(&mut self) {
        let Some(action) = self.action.clone() else {
            self.advance_turn();
            return;
        };
        match action.block {
            Some(block) => {
                let line = format!(
                    "{}'s {} was blocked by {}",
                    self.name_of(action.actor),
                    action.kind,
                    self.name_of(block.by)
                );
                self.record(line);
                self.advance_turn();
            }
            None => self.succeed(),
        }
    }

    // -----------------------------------------------------------------------
    // Reveals and card loss
    // -----------------------------------------------------------------------

    pub(super) fn show_card(&mut self, player: PlayerId, card: Card) -> Verdict {
        let Phase::AwaitingReveal(challenge) = &self.phase else {
            return Err("no challenge pending");
        };
        let challenge = *challenge;
        if challenge.claimant != player {
            return Err("not the challenged player");
        }
        let pos = self.seat_of(player).ok_or("not seated")?;
        if !self.players[pos].holds(card) {
            return Err("card not in hand");
        }

        let claimant = self.name_of(player);
        let challenger = self.name_of(challenge.challenger);
        if card == challenge.claim {
            self.players[pos].reveal(card);
            self.deck.put_front(card);
            self.deck.shuffle(&mut self.rng);
            if let Some(fresh) = self.deck.draw() {
                self.players[pos].hand.push(fresh);
            }
            self.record(format!(
                "{claimant} showed a {card}; {challenger} loses the challenge"
            ));
            self.request_drop(
                challenge.challenger,
                DropReason::ChallengeFailed(challenge.source),
            );
        } else {
            self.record(format!(
                "{claimant} showed a {card} and was bluffing the {}",
                challenge.claim
            ));
            self.request_drop(player, DropReason::BluffCaught(challenge.source));
        }
        Ok(())
    }

    fn request_drop(&mut self, player: PlayerId, reason: DropReason) {
        self.passed.clear();
        self.enter(Phase::AwaitingCardDrop(DropRequest::new(player, reason)));
        if reason != DropReason::Assassinated {
            self.prompt_drop();
        }
    }

    /// Asks the owing player to choose a card, once per request.
    pub(super) fn prompt_drop(&mut self) {
        let Phase::AwaitingCardDrop(request) = &mut self.phase else {
            return;
        };
        if request.prompted || request.token.is_spent() {
            return;
        }
        request.prompted = true;
        let (player, reason) = (request.player, request.reason);
        self.emit(
            Recipient::Player(player),
            ServerMessage::ChooseCardToDrop { reason },
        );
    }

    pub(super) fn drop_card(&mut self, player: PlayerId, card: Card) -> Verdict {
        let Phase::AwaitingCardDrop(request) = &self.phase else {
            return Err("no card drop pending");
        };
        if request.player != player {
            return Err("drop is owed by someone else");
        }
        let reason = request.reason;
        let pos = self.seat_of(player).ok_or("not seated")?;
        if !self.players[pos].holds(card) {
            return Err("card not in hand");
        }
        if let Phase::AwaitingCardDrop(request) = &mut self.phase {
            if !request.token.claim() {
                return Err("drop already settled");
            }
        }

        self.players[pos].discard(card);
        self.deck.put_front(card);
        let name = self.players[pos].name.clone();
        self.record(format!("{name} lost a {card}"));

        if self.players[pos].hand.is_empty() {
            self.eliminate(pos);
            if self.check_winner() {
                return Ok(());
            }
        }
        self.after_drop(reason, player);
        Ok(())
    }

    /// Decides where the turn goes once a card has been given up.
    fn after_drop(&mut self, reason: DropReason, dropped_by: PlayerId) {
        let Some(action) = self.action.clone() else {
            self.advance_turn();
            return;
        };
        let actor = self.name_of(action.actor);
        match reason {
            DropReason::Coup | DropReason::Assassinated => self.advance_turn(),
            DropReason::BluffCaught(ClaimSource::Actor) => {
                self.record(format!("{actor}'s {} fails", action.kind));
                self.advance_turn();
            }
            DropReason::ChallengeFailed(ClaimSource::Blocker) => {
                self.record(format!("the block stands and {actor}'s {} fails", action.kind));
                self.advance_turn();
            }
            DropReason::BluffCaught(ClaimSource::Blocker) => {
                if let Some(action) = self.action.as_mut() {
                    action.block = None;
                }
                self.record(format!("the block falls and {actor}'s {} goes ahead", action.kind));
                self.succeed();
            }
            DropReason::ChallengeFailed(ClaimSource::Actor) => {
                let reopen = action.kind.rule().second_phase
                    && !action.second_phase
                    && action
                        .target
                        .is_some_and(|t| t != dropped_by && self.is_alive(t));
                if reopen {
                    self.open_second_window();
                } else {
                    self.succeed();
                }
            }
        }
    }

    /// Gives the target of a vindicated action one more chance to block.
    fn open_second_window(&mut self) {
        let Some(action) = self.action.as_mut() else {
            return;
        };
        action.second_phase = true;
        let (actor, kind, claim, target) = (action.actor, action.kind, action.claim, action.target);
        self.passed.clear();
        self.enter(Phase::AwaitingSecondResponse);
        if let Some(target) = target {
            self.emit(
                Recipient::Player(target),
                ServerMessage::ChooseBlockOrChallenge {
                    claimant: actor,
                    action: kind,
                    claim,
                },
            );
        }
    }

    // -----------------------------------------------------------------------
    // Success
    // -----------------------------------------------------------------------

    fn credit(&mut self, player: PlayerId, coins: u32) {
        if let Some(p) = self.player_mut(player) {
            p.coins += coins;
        }
    }

    /// Applies the current action's effect.
    fn succeed(&mut self) {
        let Some(action) = self.action.clone() else {
            self.advance_turn();
            return;
        };
        let actor = self.name_of(action.actor);
        match action.kind {
            ActionKind::ForeignAid => {
                self.credit(action.actor, FOREIGN_AID_GAIN);
                self.record(format!("{actor} collected foreign aid (+{FOREIGN_AID_GAIN})"));
                self.advance_turn();
            }
            ActionKind::Tax => {
                self.credit(action.actor, TAX_GAIN);
                self.record(format!("{actor} collected tax (+{TAX_GAIN})"));
                self.advance_turn();
            }
            ActionKind::Steal => {
                if let Some(target) = action.target {
                    let amount = self.player(target).map_or(0, |p| p.coins.min(STEAL_AMOUNT));
                    if let Some(p) = self.player_mut(target) {
                        p.coins -= amount;
                    }
                    self.credit(action.actor, amount);
                    let line = format!("{actor} stole {amount} from {}", self.name_of(target));
                    self.record(line);
                }
                self.advance_turn();
            }
            ActionKind::Assassinate => match action.target.filter(|t| self.is_alive(*t)) {
                Some(target) => {
                    let line = format!("{actor} assassinates {}", self.name_of(target));
                    self.record(line);
                    self.request_drop(target, DropReason::Assassinated);
                }
                None => self.advance_turn(),
            },
            ActionKind::Exchange => self.begin_exchange(action.actor),
            ActionKind::Income | ActionKind::Coup => self.advance_turn(),
        }
    }

    // -----------------------------------------------------------------------
    // Exchange
    // -----------------------------------------------------------------------

    fn begin_exchange(&mut self, actor: PlayerId) {
        if self.check_winner() {
            return;
        }
        let Some(pos) = self.seat_of(actor) else {
            self.advance_turn();
            return;
        };
        let drawn = self.deck.draw_many(EXCHANGE_DRAW);
        let keep = self.players[pos].hand.len();
        let mut available = self.players[pos].hand.clone();
        available.extend(&drawn);
        if let Some(action) = self.action.as_mut() {
            action.exchanged = true;
        }
        let name = self.players[pos].name.clone();
        self.record(format!("{name} drew {} cards to exchange", drawn.len()));
        self.enter(Phase::AwaitingExchangeSelection(ExchangeRequest::new(
            actor, drawn, keep,
        )));
        self.emit(
            Recipient::Player(actor),
            ServerMessage::ChooseExchange { available, keep },
        );
    }

    pub(super) fn confirm_exchange(&mut self, player: PlayerId, keep: Vec<Card>) -> Verdict {
        let Phase::AwaitingExchangeSelection(request) = &self.phase else {
            return Err("no exchange pending");
        };
        if request.player != player {
            return Err("exchange belongs to someone else");
        }
        if keep.len() != request.keep {
            return Err("wrong number of cards kept");
        }
        let pos = self.seat_of(player).ok_or("not seated")?;
        let mut pool = self.players[pos].hand.clone();
        pool.extend(request.drawn.iter().copied());
        for card in &keep {
            let i = pool
                .iter()
                .position(|c| c == card)
                .ok_or("card not in the exchange pool")?;
            pool.swap_remove(i);
        }
        if let Phase::AwaitingExchangeSelection(request) = &mut self.phase {
            if !request.token.claim() {
                return Err("exchange already settled");
            }
        }

        self.players[pos].hand = keep;
        for card in pool {
            self.deck.put_back(card);
        }
        self.deck.shuffle(&mut self.rng);
        if let Some(action) = self.action.as_mut() {
            action.exchanged = false;
        }
        let name = self.players[pos].name.clone();
        self.record(format!("{name} finished exchanging"));
        self.advance_turn();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Timeouts
    // -----------------------------------------------------------------------

    pub(super) fn on_expired(&mut self, kind: TimerKind) {
        match (&self.phase, kind) {
            (Phase::AwaitingTurnAction, TimerKind::Turn) => self.turn_timed_out(),
            (Phase::AwaitingResponse | Phase::AwaitingSecondResponse, TimerKind::Popup) => {
                self.resolve_window();
            }
            (Phase::AwaitingReveal(challenge), TimerKind::Popup) => {
                let claimant = challenge.claimant;
                self.auto_reveal(claimant);
            }
            (Phase::AwaitingCardDrop(request), TimerKind::Popup | TimerKind::Assassinate) => {
                let player = request.player;
                self.auto_drop(player);
            }
            (Phase::AwaitingExchangeSelection(request), TimerKind::Exchange) => {
                let player = request.player;
                self.auto_exchange(player);
            }
            (Phase::AwaitingVotes, TimerKind::Vote) => self.conclude(false),
            (phase, kind) => {
                debug!(game_id = %self.game_id, phase = phase.name(), %kind, "expiry matches no phase");
            }
        }
    }

    fn random_card(&mut self, player: PlayerId) -> Option<Card> {
        let hand = &self.players.iter().find(|p| p.id == player)?.hand;
        hand.choose(&mut self.rng).copied()
    }

    fn auto_reveal(&mut self, claimant: PlayerId) {
        match self.random_card(claimant) {
            Some(card) => {
                if let Err(reason) = self.show_card(claimant, card) {
                    debug!(game_id = %self.game_id, reason, "auto reveal rejected");
                }
            }
            None => self.advance_turn(),
        }
    }

    fn auto_drop(&mut self, player: PlayerId) {
        match self.random_card(player) {
            Some(card) => {
                if let Err(reason) = self.drop_card(player, card) {
                    debug!(game_id = %self.game_id, reason, "auto drop rejected");
                }
            }
            None => self.advance_turn(),
        }
    }

    fn auto_exchange(&mut self, player: PlayerId) {
        let Phase::AwaitingExchangeSelection(request) = &self.phase else {
            return;
        };
        let Some(hand) = self.player(player).map(|p| p.hand.clone()) else {
            self.advance_turn();
            return;
        };
        let count = request.keep;
        let mut pool = hand;
        pool.extend(request.drawn.iter().copied());
        let keep: Vec<Card> = pool.choose_multiple(&mut self.rng, count).copied().collect();
        if let Err(reason) = self.confirm_exchange(player, keep) {
            debug!(game_id = %self.game_id, reason, "auto exchange rejected");
        }
    }

    /// Penalises a turn holder who let the clock run out.
    ///
    /// The idle streak grows by one. At the limit the player is banned and
    /// removed. Otherwise a player rich enough to coup is made to coup a
    /// random opponent and is fined a coin on top; anyone else with coins
    /// is fined one.
    fn turn_timed_out(&mut self) {
        let Some(current) = self.turn else {
            self.advance_turn();
            return;
        };
        let limit = self.config.max_ban_stack;
        let Some(player) = self.player_mut(current) else {
            self.advance_turn();
            return;
        };
        player.ban_stack = player.ban_stack.saturating_add(1).min(limit);
        let (streak, coins, name) = (player.ban_stack, player.coins, player.name.clone());

        if streak >= limit {
            info!(game_id = %self.game_id, player = %current, streak, "idle limit reached");
            self.remove_player(current, Departure::Idle);
            return;
        }

        if coins >= FORCED_COUP_THRESHOLD {
            let opponents: Vec<PlayerId> =
                self.alive().into_iter().filter(|p| *p != current).collect();
            if let Some(&victim) = opponents.choose(&mut self.rng) {
                self.record(format!("{name} ran out of time holding {coins} coins"));
                self.coup(current, victim);
                if let Some(player) = self.player_mut(current) {
                    player.coins = player.coins.saturating_sub(1);
                }
                return;
            }
        }

        if coins > 0 {
            if let Some(player) = self.player_mut(current) {
                player.coins -= 1;
            }
            self.record(format!("{name} ran out of time and paid 1 coin"));
        } else {
            self.record(format!("{name} ran out of time"));
        }
        self.advance_turn();
    }
}
