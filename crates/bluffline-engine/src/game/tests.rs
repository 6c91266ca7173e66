use bluffline_protocol::{GameId, PlayerId, Recipient, RoomId};
use bluffline_tick::TimerKind;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::{Departure, Game, SetupError};
use crate::{
    ActionKind, Card, ClaimSource, ClientMessage, DropReason, Effect, GameConfig, Outbox, Phase,
    Seat, ServerMessage,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn seats(n: u64) -> Vec<Seat> {
    (1..=n)
        .map(|i| Seat::new(PlayerId(i), format!("p{i}")))
        .collect()
}

fn config() -> GameConfig {
    GameConfig {
        seed: Some(42),
        ..GameConfig::default()
    }
}

fn new_game(n: u64) -> Game {
    Game::new(GameId(1), RoomId(1), seats(n), config()).unwrap()
}

/// Seats in turn order, starting with the current turn holder.
fn order(game: &Game) -> Vec<PlayerId> {
    let seats: Vec<PlayerId> = game.ring.iter().collect();
    let start = seats
        .iter()
        .position(|p| Some(*p) == game.turn)
        .unwrap();
    seats
        .iter()
        .cycle()
        .skip(start)
        .take(seats.len())
        .copied()
        .collect()
}

/// Replaces the listed hands with exactly the given cards.
fn rig(game: &mut Game, hands: &[(PlayerId, &[Card])]) {
    for (player, _) in hands {
        let pos = game.seat_of(*player).unwrap();
        for card in std::mem::take(&mut game.players[pos].hand) {
            game.deck.put_back(card);
        }
    }
    for (player, hand) in hands {
        let pos = game.seat_of(*player).unwrap();
        for card in *hand {
            let card = game.deck.take(*card).expect("card left in deck");
            game.players[pos].hand.push(card);
        }
    }
}

fn set_coins(game: &mut Game, player: PlayerId, coins: u32) {
    game.player_mut(player).unwrap().coins = coins;
}

fn coins(game: &Game, player: PlayerId) -> u32 {
    game.player(player).unwrap().coins
}

fn hand(game: &Game, player: PlayerId) -> Vec<Card> {
    game.player(player).unwrap().hand.clone()
}

fn declare(action: ActionKind, target: Option<PlayerId>) -> ClientMessage {
    ClientMessage::DeclareAction { action, target }
}

/// Ticks until the countdown guarding the current phase runs out.
fn expire(game: &mut Game) -> Outbox {
    let kind = game.phase.timer().expect("phase has a timer");
    let secs = game.timers.remaining(kind);
    let mut out = Outbox::default();
    for _ in 0..secs {
        let tick = game.tick();
        out.messages.extend(tick.messages);
        out.effects.extend(tick.effects);
    }
    out
}

fn assert_invariants(game: &Game) {
    assert_eq!(game.card_count(), Card::DECK_SIZE, "cards must be conserved");
    let exclusive = [
        TimerKind::Turn,
        TimerKind::Popup,
        TimerKind::Assassinate,
        TimerKind::Exchange,
    ]
    .iter()
    .filter(|k| game.timers.is_armed(**k))
    .count();
    assert!(exclusive <= 1, "more than one phase timer armed");
    for player in &game.players {
        assert_eq!(player.is_alive(), !player.hand.is_empty(), "{}", player.name);
    }
    if let Some(turn) = game.turn {
        assert!(game.is_alive(turn), "turn holder must be alive");
    }
    if matches!(game.phase, Phase::AwaitingTurnAction) {
        assert!(game.action.is_none(), "stale action at turn start");
    }
    assert!(game.history.len() <= game.config.history_capacity);
}

fn has_effect(out: &Outbox, effect: &Effect) -> bool {
    out.effects.contains(effect)
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[test]
fn test_new_deals_two_cards_each_and_starts_turn() {
    let game = new_game(3);
    assert_eq!(game.players.len(), 3);
    for player in &game.players {
        assert_eq!(player.hand.len(), 2);
        assert_eq!(player.coins, 2);
    }
    assert_eq!(game.deck.len(), Card::DECK_SIZE - 6);
    assert_eq!(game.phase, Phase::AwaitingTurnAction);
    assert_eq!(game.timers.remaining(TimerKind::Turn), 30);
    assert!(game.turn.is_some());
    assert_invariants(&game);
}

#[test]
fn test_new_bad_roster_rejected() {
    let err = Game::new(GameId(1), RoomId(1), seats(1), config()).err();
    assert_eq!(err, Some(SetupError::NotEnoughPlayers { count: 1 }));

    let err = Game::new(GameId(1), RoomId(1), seats(7), config()).err();
    assert_eq!(err, Some(SetupError::TooManyPlayers { count: 7 }));

    let mut roster = seats(2);
    roster.push(Seat::new(PlayerId(2), "again"));
    let err = Game::new(GameId(1), RoomId(1), roster, config()).err();
    assert_eq!(err, Some(SetupError::DuplicatePlayer(PlayerId(2))));
}

#[test]
fn test_new_same_seed_deals_same_table() {
    let a = new_game(4);
    let b = new_game(4);
    assert_eq!(a.snapshot(), b.snapshot());
}

// ---------------------------------------------------------------------------
// Declaring
// ---------------------------------------------------------------------------

#[test]
fn test_declare_action_out_of_turn_ignored() {
    let mut game = new_game(3);
    let other = order(&game)[1];
    let out = game.handle(other, declare(ActionKind::Income, None));
    assert!(out.is_empty());
    assert_eq!(coins(&game, other), 2);
}

#[test]
fn test_declare_action_income_advances_turn() {
    let mut game = new_game(3);
    let seats = order(&game);
    let out = game.handle(seats[0], declare(ActionKind::Income, None));
    assert_eq!(coins(&game, seats[0]), 3);
    assert_eq!(game.turn, Some(seats[1]));
    assert!(
        out.messages
            .iter()
            .any(|(to, m)| *to == Recipient::All && matches!(m, ServerMessage::State(_)))
    );
    assert_invariants(&game);
}

#[test]
fn test_declare_action_coup_without_coins_ignored() {
    let mut game = new_game(3);
    let seats = order(&game);
    let out = game.handle(seats[0], declare(ActionKind::Coup, Some(seats[1])));
    assert!(out.is_empty());
    assert_eq!(game.phase, Phase::AwaitingTurnAction);
}

#[test]
fn test_declare_action_steal_from_broke_target_ignored() {
    let mut game = new_game(3);
    let seats = order(&game);
    set_coins(&mut game, seats[1], 0);
    assert!(
        game.handle(seats[0], declare(ActionKind::Steal, Some(seats[1])))
            .is_empty()
    );
    assert!(
        game.handle(seats[0], declare(ActionKind::Steal, Some(seats[0])))
            .is_empty()
    );
    assert!(
        game.handle(seats[0], declare(ActionKind::Steal, None))
            .is_empty()
    );
    assert!(game.action.is_none());
}

#[test]
fn test_declare_action_opens_window_and_prompts_others() {
    let mut game = new_game(3);
    let seats = order(&game);
    let out = game.handle(seats[0], declare(ActionKind::Tax, None));
    assert_eq!(game.phase, Phase::AwaitingResponse);
    assert!(!game.timers.is_armed(TimerKind::Turn));
    assert_eq!(game.timers.remaining(TimerKind::Popup), 10);
    assert!(out.for_player(seats[1]).any(|m| matches!(
        m,
        ServerMessage::ChooseBlockOrChallenge {
            action: ActionKind::Tax,
            claim: Some(Card::Lion),
            ..
        }
    )));
    assert!(
        !out.for_player(seats[0])
            .any(|m| matches!(m, ServerMessage::ChooseBlockOrChallenge { .. }))
    );
}

#[test]
fn test_declare_action_resets_ban_stack() {
    let mut game = new_game(3);
    let seats = order(&game);
    game.player_mut(seats[0]).unwrap().ban_stack = 2;
    game.handle(seats[0], declare(ActionKind::Income, None));
    assert_eq!(game.player(seats[0]).unwrap().ban_stack, 0);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_handle_coup_target_drops_card_and_turn_advances() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);
    set_coins(&mut game, x, 7);

    let out = game.handle(x, declare(ActionKind::Coup, Some(y)));
    assert_eq!(coins(&game, x), 0);
    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_eq!(request.player, y);
            assert_eq!(request.reason, DropReason::Coup);
        }
        other => panic!("unexpected phase {other:?}"),
    }
    assert!(out.for_player(y).any(|m| matches!(
        m,
        ServerMessage::ChooseCardToDrop {
            reason: DropReason::Coup
        }
    )));

    // a coup cannot be answered
    assert!(game.handle(z, ClientMessage::Pass).is_empty());
    assert!(game.handle(z, ClientMessage::Challenge).is_empty());

    let card = hand(&game, y)[0];
    game.handle(y, ClientMessage::DropCard { card });
    assert_eq!(hand(&game, y).len(), 1);
    assert!(game.is_alive(y));
    assert_eq!(game.turn, Some(y));
    assert_eq!(game.deck.peek_front(), Some(card));
    assert_invariants(&game);
}

#[test]
fn test_handle_foreign_aid_blocked_unchallenged_fails() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);

    game.handle(x, declare(ActionKind::ForeignAid, None));
    let out = game.handle(
        z,
        ClientMessage::Block {
            action: ActionKind::ForeignAid,
            card: None,
        },
    );
    assert_eq!(game.action.as_ref().unwrap().block.unwrap().card, Card::Lion);
    assert!(out.for_player(x).any(|m| matches!(
        m,
        ServerMessage::ChooseBlockOrChallenge { claimant, .. } if *claimant == z
    )));

    expire(&mut game);
    assert_eq!(coins(&game, x), 2);
    assert_eq!(game.turn, Some(y));
    assert!(game.history().iter().any(|l| l.contains("blocked by")));
    assert_invariants(&game);
}

#[test]
fn test_handle_steal_truthful_reveal_challenger_drops_and_steal_lands() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, w) = (seats[0], seats[1], seats[2]);
    rig(
        &mut game,
        &[
            (x, &[Card::Cat, Card::Lion]),
            (y, &[Card::Bear, Card::Turtle]),
            (w, &[Card::Turtle, Card::Crocodile]),
        ],
    );
    set_coins(&mut game, y, 5);

    game.handle(x, declare(ActionKind::Steal, Some(y)));
    let out = game.handle(w, ClientMessage::Challenge);
    assert!(matches!(game.phase, Phase::AwaitingReveal(_)));
    assert!(
        out.for_player(x)
            .any(|m| matches!(m, ServerMessage::ChooseCardToShow { claim: Card::Cat, .. }))
    );

    game.handle(x, ClientMessage::ShowCard { card: Card::Cat });
    assert_eq!(hand(&game, x).len(), 2);
    assert!(hand(&game, x).contains(&Card::Lion));
    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_eq!(request.player, w);
            assert_eq!(request.reason, DropReason::ChallengeFailed(ClaimSource::Actor));
        }
        other => panic!("unexpected phase {other:?}"),
    }
    assert_invariants(&game);

    let out = game.handle(w, ClientMessage::DropCard { card: Card::Turtle });
    assert_eq!(hand(&game, w), vec![Card::Crocodile]);
    assert_eq!(game.phase, Phase::AwaitingSecondResponse);
    assert!(out.for_player(y).any(|m| matches!(
        m,
        ServerMessage::ChooseBlockOrChallenge {
            action: ActionKind::Steal,
            ..
        }
    )));
    // the actor's claim already held up
    assert!(game.handle(w, ClientMessage::Challenge).is_empty());
    // only the target's answer counts now
    assert!(game.handle(w, ClientMessage::Pass).is_empty());

    game.handle(y, ClientMessage::Pass);
    assert_eq!(coins(&game, x), 4);
    assert_eq!(coins(&game, y), 3);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_handle_second_window_bluffed_block_caught_steal_lands() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, w) = (seats[0], seats[1], seats[2]);
    rig(
        &mut game,
        &[
            (x, &[Card::Cat, Card::Lion]),
            (y, &[Card::Turtle, Card::Lion]),
            (w, &[Card::Turtle, Card::Crocodile]),
        ],
    );
    set_coins(&mut game, y, 5);

    game.handle(x, declare(ActionKind::Steal, Some(y)));
    game.handle(w, ClientMessage::Challenge);
    game.handle(x, ClientMessage::ShowCard { card: Card::Cat });
    game.handle(w, ClientMessage::DropCard { card: Card::Turtle });
    assert_eq!(game.phase, Phase::AwaitingSecondResponse);
    assert!(game.action.as_ref().unwrap().second_phase);

    let out = game.handle(
        y,
        ClientMessage::Block {
            action: ActionKind::Steal,
            card: Some(Card::Bear),
        },
    );
    assert!(!out.is_empty());
    assert_eq!(game.phase, Phase::AwaitingSecondResponse);

    game.handle(x, ClientMessage::Challenge);
    match &game.phase {
        Phase::AwaitingReveal(challenge) => {
            assert_eq!(challenge.claimant, y);
            assert_eq!(challenge.claim, Card::Bear);
            assert_eq!(challenge.source, ClaimSource::Blocker);
        }
        other => panic!("unexpected phase {other:?}"),
    }

    game.handle(y, ClientMessage::ShowCard { card: Card::Turtle });
    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_eq!(request.player, y);
            assert_eq!(request.reason, DropReason::BluffCaught(ClaimSource::Blocker));
        }
        other => panic!("unexpected phase {other:?}"),
    }
    game.handle(y, ClientMessage::DropCard { card: Card::Turtle });

    // the steal lands and no third window opens
    assert_eq!(hand(&game, y), vec![Card::Lion]);
    assert_eq!(coins(&game, x), 4);
    assert_eq!(coins(&game, y), 3);
    assert_eq!(game.phase, Phase::AwaitingTurnAction);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_handle_second_window_honest_block_survives_challenge_steal_fails() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, w) = (seats[0], seats[1], seats[2]);
    rig(
        &mut game,
        &[
            (x, &[Card::Cat, Card::Lion]),
            (y, &[Card::Bear, Card::Turtle]),
            (w, &[Card::Turtle, Card::Crocodile]),
        ],
    );
    set_coins(&mut game, y, 5);

    game.handle(x, declare(ActionKind::Steal, Some(y)));
    game.handle(w, ClientMessage::Challenge);
    game.handle(x, ClientMessage::ShowCard { card: Card::Cat });
    game.handle(w, ClientMessage::DropCard { card: Card::Turtle });
    game.handle(
        y,
        ClientMessage::Block {
            action: ActionKind::Steal,
            card: Some(Card::Bear),
        },
    );
    game.handle(x, ClientMessage::Challenge);
    game.handle(y, ClientMessage::ShowCard { card: Card::Bear });
    assert_eq!(hand(&game, y).len(), 2);
    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_eq!(request.player, x);
            assert_eq!(request.reason, DropReason::ChallengeFailed(ClaimSource::Blocker));
        }
        other => panic!("unexpected phase {other:?}"),
    }

    let card = hand(&game, x)[0];
    game.handle(x, ClientMessage::DropCard { card });

    assert_eq!(hand(&game, x).len(), 1);
    assert_eq!(coins(&game, x), 2);
    assert_eq!(coins(&game, y), 5);
    assert_eq!(game.phase, Phase::AwaitingTurnAction);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_handle_second_window_bluffed_block_caught_assassination_lands() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, w) = (seats[0], seats[1], seats[2]);
    rig(
        &mut game,
        &[
            (x, &[Card::Crocodile, Card::Lion]),
            (y, &[Card::Lion, Card::Cat]),
            (w, &[Card::Turtle, Card::Bear]),
        ],
    );
    set_coins(&mut game, x, 3);

    game.handle(x, declare(ActionKind::Assassinate, Some(y)));
    game.handle(w, ClientMessage::Challenge);
    game.handle(x, ClientMessage::ShowCard { card: Card::Crocodile });
    game.handle(w, ClientMessage::DropCard { card: Card::Turtle });
    assert_eq!(game.phase, Phase::AwaitingSecondResponse);

    game.handle(
        y,
        ClientMessage::Block {
            action: ActionKind::Assassinate,
            card: None,
        },
    );
    game.handle(x, ClientMessage::Challenge);
    game.handle(y, ClientMessage::ShowCard { card: Card::Lion });
    game.handle(y, ClientMessage::DropCard { card: Card::Lion });

    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_eq!(request.player, y);
            assert_eq!(request.reason, DropReason::Assassinated);
        }
        other => panic!("unexpected phase {other:?}"),
    }
    assert_eq!(hand(&game, y), vec![Card::Cat]);

    game.handle(y, ClientMessage::DropCard { card: Card::Cat });
    assert!(!game.is_alive(y));
    assert_eq!(game.turn, Some(w));
    assert_invariants(&game);
}

#[test]
fn test_handle_steal_target_loses_challenge_no_second_window() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);
    rig(
        &mut game,
        &[(x, &[Card::Cat, Card::Lion]), (y, &[Card::Bear, Card::Turtle])],
    );

    game.handle(x, declare(ActionKind::Steal, Some(y)));
    game.handle(y, ClientMessage::Challenge);
    game.handle(x, ClientMessage::ShowCard { card: Card::Cat });
    game.handle(y, ClientMessage::DropCard { card: Card::Bear });
    assert_eq!(coins(&game, x), 4);
    assert_eq!(coins(&game, y), 0);
    assert_eq!(game.phase, Phase::AwaitingTurnAction);
    assert_eq!(game.turn, Some(y));
}

#[test]
fn test_handle_tax_bluff_caught_actor_drops_and_gains_nothing() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);
    rig(&mut game, &[(x, &[Card::Bear, Card::Turtle])]);

    game.handle(x, declare(ActionKind::Tax, None));
    game.handle(y, ClientMessage::Challenge);
    game.handle(x, ClientMessage::ShowCard { card: Card::Bear });
    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_eq!(request.player, x);
            assert_eq!(request.reason, DropReason::BluffCaught(ClaimSource::Actor));
        }
        other => panic!("unexpected phase {other:?}"),
    }
    game.handle(x, ClientMessage::DropCard { card: Card::Turtle });
    assert_eq!(hand(&game, x), vec![Card::Bear]);
    assert_eq!(coins(&game, x), 2);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_handle_block_bluff_caught_action_succeeds() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);
    rig(&mut game, &[(y, &[Card::Cat, Card::Bear])]);

    game.handle(x, declare(ActionKind::ForeignAid, None));
    game.handle(
        y,
        ClientMessage::Block {
            action: ActionKind::ForeignAid,
            card: Some(Card::Lion),
        },
    );
    game.handle(x, ClientMessage::Challenge);
    game.handle(y, ClientMessage::ShowCard { card: Card::Cat });
    game.handle(y, ClientMessage::DropCard { card: Card::Cat });

    assert_eq!(coins(&game, x), 4);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_handle_block_truthful_challenger_drops_and_block_stands() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);
    rig(
        &mut game,
        &[(x, &[Card::Cat, Card::Bear]), (y, &[Card::Lion, Card::Turtle])],
    );

    game.handle(x, declare(ActionKind::ForeignAid, None));
    game.handle(
        y,
        ClientMessage::Block {
            action: ActionKind::ForeignAid,
            card: None,
        },
    );
    game.handle(x, ClientMessage::Challenge);
    game.handle(y, ClientMessage::ShowCard { card: Card::Lion });
    assert_eq!(hand(&game, y).len(), 2);
    game.handle(x, ClientMessage::DropCard { card: Card::Cat });

    assert_eq!(coins(&game, x), 2);
    assert_eq!(hand(&game, x), vec![Card::Bear]);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_handle_block_steal_needs_named_card() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);

    game.handle(x, declare(ActionKind::Steal, Some(y)));
    let block = |card: Option<Card>| ClientMessage::Block {
        action: ActionKind::Steal,
        card,
    };
    assert!(game.handle(y, block(None)).is_empty());
    assert!(game.handle(y, block(Some(Card::Turtle))).is_empty());
    assert!(!game.handle(y, block(Some(Card::Bear))).is_empty());
    assert!(game.action.as_ref().unwrap().is_blocked());
    // a second block on the same action is refused
    assert!(game.handle(seats[2], block(Some(Card::Cat))).is_empty());
}

#[test]
fn test_handle_tax_cannot_be_blocked() {
    let mut game = new_game(3);
    let seats = order(&game);
    game.handle(seats[0], declare(ActionKind::Tax, None));
    let out = game.handle(
        seats[1],
        ClientMessage::Block {
            action: ActionKind::Tax,
            card: Some(Card::Lion),
        },
    );
    assert!(out.is_empty());
}

#[test]
fn test_handle_assassinate_lands_and_times_out_to_auto_drop() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);
    set_coins(&mut game, x, 3);

    game.handle(x, declare(ActionKind::Assassinate, Some(y)));
    assert_eq!(coins(&game, x), 0);
    game.handle(y, ClientMessage::Pass);
    game.handle(z, ClientMessage::Pass);

    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_eq!(request.player, y);
            assert_eq!(request.reason, DropReason::Assassinated);
        }
        other => panic!("unexpected phase {other:?}"),
    }
    assert!(game.timers.is_armed(TimerKind::Assassinate));
    assert!(!game.timers.is_armed(TimerKind::Popup));

    expire(&mut game);
    assert_eq!(hand(&game, y).len(), 1);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_tick_assassination_prompt_waits_one_tick() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);
    set_coins(&mut game, x, 3);
    let prompted = |out: &Outbox| {
        out.for_player(y).any(|m| {
            matches!(
                m,
                ServerMessage::ChooseCardToDrop {
                    reason: DropReason::Assassinated
                }
            )
        })
    };

    game.handle(x, declare(ActionKind::Assassinate, Some(y)));
    game.handle(y, ClientMessage::Pass);
    let out = game.handle(z, ClientMessage::Pass);
    assert!(!prompted(&out));
    assert!(matches!(&game.phase, Phase::AwaitingCardDrop(r) if !r.is_prompted()));

    let out = game.tick();
    assert!(prompted(&out));
    assert!(matches!(&game.phase, Phase::AwaitingCardDrop(r) if r.is_prompted()));

    let out = game.tick();
    assert!(!prompted(&out), "asked only once");
    assert_eq!(game.timers.remaining(TimerKind::Assassinate), 8);
}

#[test]
fn test_handle_exchange_timeout_auto_selects_hand_size() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);

    game.handle(x, declare(ActionKind::Exchange, None));
    game.handle(y, ClientMessage::Pass);
    let out = game.handle(z, ClientMessage::Pass);

    assert!(matches!(game.phase, Phase::AwaitingExchangeSelection(_)));
    assert!(game.action.as_ref().unwrap().exchanged);
    assert!(game.timers.is_armed(TimerKind::Exchange));
    assert!(out.for_player(x).any(|m| matches!(
        m,
        ServerMessage::ChooseExchange { available, keep: 2 } if available.len() == 4
    )));
    assert_eq!(game.deck.len(), Card::DECK_SIZE - 8);
    assert_invariants(&game);

    expire(&mut game);
    assert_eq!(hand(&game, x).len(), 2);
    assert_eq!(game.deck.len(), Card::DECK_SIZE - 6);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_confirm_exchange_rejects_foreign_cards_and_keeps_pool_subset() {
    let mut game = new_game(3);
    let seats = order(&game);
    let x = seats[0];

    game.handle(x, declare(ActionKind::Exchange, None));
    expire(&mut game);
    let Phase::AwaitingExchangeSelection(request) = &game.phase else {
        panic!("expected exchange selection");
    };
    let drawn = request.drawn.clone();
    let mut pool = hand(&game, x);
    pool.extend(&drawn);
    let missing = *Card::ALL.iter().find(|c| !pool.contains(c)).unwrap();

    let bad = ClientMessage::ConfirmExchange {
        keep: vec![missing, pool[0]],
    };
    assert!(game.handle(x, bad).is_empty());
    let short = ClientMessage::ConfirmExchange {
        keep: vec![pool[0]],
    };
    assert!(game.handle(x, short).is_empty());
    assert!(game.handle(seats[1], ClientMessage::ConfirmExchange { keep: drawn.clone() }).is_empty());

    game.handle(x, ClientMessage::ConfirmExchange { keep: drawn.clone() });
    assert_eq!(hand(&game, x), drawn);
    assert_eq!(game.turn, Some(seats[1]));
    // settled already
    assert!(game.handle(x, ClientMessage::ConfirmExchange { keep: drawn }).is_empty());
    assert_invariants(&game);
}

#[test]
fn test_drop_card_on_last_second_settles_once() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);
    set_coins(&mut game, x, 7);
    game.handle(x, declare(ActionKind::Coup, Some(y)));
    while game.timers.remaining(TimerKind::Popup) > 1 {
        game.tick();
    }
    let deck = game.deck.len();
    let card = hand(&game, y)[0];

    game.handle(y, ClientMessage::DropCard { card });
    game.tick();

    assert_eq!(hand(&game, y).len(), 1);
    assert_eq!(game.deck.len(), deck + 1);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

#[test]
fn test_drop_card_after_timeout_is_ignored() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);
    set_coins(&mut game, x, 7);
    game.handle(x, declare(ActionKind::Coup, Some(y)));
    let deck = game.deck.len();

    expire(&mut game);
    let left = hand(&game, y);
    let out = game.handle(y, ClientMessage::DropCard { card: left[0] });

    assert!(out.is_empty());
    assert_eq!(hand(&game, y), left);
    assert_eq!(left.len(), 1);
    assert_eq!(game.deck.len(), deck + 1);
    assert_invariants(&game);
}

#[test]
fn test_drop_card_not_in_hand_or_not_owed_ignored() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);
    rig(&mut game, &[(y, &[Card::Lion, Card::Lion])]);
    set_coins(&mut game, x, 7);

    game.handle(x, declare(ActionKind::Coup, Some(y)));
    assert!(game.handle(y, ClientMessage::DropCard { card: Card::Bear }).is_empty());
    let zc = hand(&game, z)[0];
    assert!(game.handle(z, ClientMessage::DropCard { card: zc }).is_empty());
    assert!(!game.handle(y, ClientMessage::DropCard { card: Card::Lion }).is_empty());
    assert!(game.handle(y, ClientMessage::DropCard { card: Card::Lion }).is_empty());
    assert_eq!(hand(&game, y), vec![Card::Lion]);
}

// ---------------------------------------------------------------------------
// Turn timer
// ---------------------------------------------------------------------------

#[test]
fn test_tick_turn_timeout_fines_one_coin() {
    let mut game = new_game(3);
    let seats = order(&game);
    expire(&mut game);
    let x = game.player(seats[0]).unwrap();
    assert_eq!(x.coins, 1);
    assert_eq!(x.ban_stack, 1);
    assert_eq!(game.turn, Some(seats[1]));
}

#[test]
fn test_tick_turn_timeout_rich_player_forced_to_coup() {
    let mut game = new_game(3);
    let seats = order(&game);
    set_coins(&mut game, seats[0], 10);
    expire(&mut game);

    assert_eq!(coins(&game, seats[0]), 2);
    match &game.phase {
        Phase::AwaitingCardDrop(request) => {
            assert_ne!(request.player, seats[0]);
            assert_eq!(request.reason, DropReason::Coup);
        }
        other => panic!("unexpected phase {other:?}"),
    }
    assert_eq!(game.player(seats[0]).unwrap().ban_stack, 1);
    assert_invariants(&game);
}

#[test]
fn test_tick_three_idle_turns_bans_player_once() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);

    let mut effects = Vec::new();
    let mut notices = 0;
    for round in 0..3 {
        assert_eq!(game.turn, Some(x), "round {round}");
        let out = expire(&mut game);
        notices += out
            .for_player(x)
            .filter(|m| matches!(m, ServerMessage::RedirectToBan))
            .count();
        effects.extend(out.effects);
        if round < 2 {
            game.handle(y, declare(ActionKind::Income, None));
            game.handle(z, declare(ActionKind::Income, None));
        }
    }

    let bans: Vec<_> = effects
        .iter()
        .filter(|e| matches!(e, Effect::RecordBan { .. }))
        .collect();
    assert_eq!(
        bans,
        vec![&Effect::RecordBan {
            player: x,
            minutes: 30
        }]
    );
    assert!(effects.contains(&Effect::RemoveFromRoom {
        room: RoomId(1),
        player: x
    }));
    assert!(effects.contains(&Effect::ClearLocation { player: x }));
    assert_eq!(notices, 1);
    assert!(game.player(x).is_none());
    assert_eq!(game.players.len(), 2);
    assert_eq!(game.turn, Some(y));
    assert_invariants(&game);
}

// ---------------------------------------------------------------------------
// Game end
// ---------------------------------------------------------------------------

/// Two players; the first coups the second down to zero cards.
fn won_game() -> (Game, PlayerId, PlayerId) {
    let mut game = new_game(2);
    let seats = order(&game);
    let (x, y) = (seats[0], seats[1]);
    rig(&mut game, &[(y, &[Card::Lion])]);
    set_coins(&mut game, x, 7);
    game.handle(x, declare(ActionKind::Coup, Some(y)));
    game.handle(y, ClientMessage::DropCard { card: Card::Lion });
    (game, x, y)
}

#[test]
fn test_drop_card_last_card_eliminates_and_crowns_winner() {
    let (game, x, y) = won_game();
    assert!(!game.is_alive(y));
    assert_eq!(game.winner, Some(x));
    assert!(game.player(x).unwrap().is_win);
    assert_eq!(game.phase, Phase::AwaitingVotes);
    assert!(game.timers.is_armed(TimerKind::Vote));
    assert!(game.turn.is_none());
    assert!(game.history().iter().any(|l| l.contains("wins the game")));
    assert_invariants(&game);
}

#[test]
fn test_pass_everyone_ready_creates_rematch() {
    let (mut game, x, y) = won_game();
    game.handle(x, ClientMessage::Pass);
    assert_eq!(game.phase, Phase::AwaitingVotes);
    assert!(game.handle(x, ClientMessage::Pass).is_empty());

    // eliminated players vote too
    let out = game.handle(y, ClientMessage::Pass);
    assert!(game.is_finished());
    assert!(has_effect(&out, &Effect::FinishGame {
        room: RoomId(1),
        game: GameId(1)
    }));
    assert!(has_effect(&out, &Effect::RecordResult { player: x, won: true }));
    assert!(has_effect(&out, &Effect::RecordResult { player: y, won: false }));
    assert!(out.effects.iter().any(|e| matches!(
        e,
        Effect::CreateRematch { owner, players } if *owner == x && players.len() == 2
    )));
    assert!(game.tick().is_empty());
}

#[test]
fn test_tick_vote_timeout_sends_everyone_home() {
    let (mut game, x, y) = won_game();
    let out = expire(&mut game);
    assert!(game.is_finished());
    assert!(!out.effects.iter().any(|e| matches!(e, Effect::CreateRematch { .. })));
    for player in [x, y] {
        assert!(
            out.for_player(player)
                .any(|m| matches!(m, ServerMessage::RedirectToHomepage))
        );
    }
}

#[test]
fn test_leave_during_votes_ends_without_rematch() {
    let (mut game, x, y) = won_game();
    let out = game.handle(y, ClientMessage::Leave);
    assert!(game.is_finished());
    assert!(has_effect(&out, &Effect::RecordResult { player: y, won: false }));
    assert!(has_effect(&out, &Effect::RecordResult { player: x, won: true }));
    assert!(!out.effects.iter().any(|e| matches!(e, Effect::CreateRematch { .. })));
    assert!(
        out.for_player(x)
            .any(|m| matches!(m, ServerMessage::RedirectToHomepage))
    );
}

#[test]
fn test_force_remove_during_votes_ends_without_rematch() {
    let (mut game, x, y) = won_game();
    game.handle(x, ClientMessage::Pass);

    let out = game.force_remove(y, Departure::Banned);

    assert!(game.is_finished());
    assert!(!out.effects.iter().any(|e| matches!(e, Effect::CreateRematch { .. })));
    assert!(has_effect(&out, &Effect::RecordResult { player: x, won: true }));
    assert!(
        out.for_player(x)
            .any(|m| matches!(m, ServerMessage::RedirectToHomepage))
    );
}

#[test]
fn test_handle_after_finish_ignored() {
    let (mut game, x, _) = won_game();
    expire(&mut game);
    assert!(game.handle(x, ClientMessage::Pass).is_empty());
    assert!(game.force_remove(x, Departure::Banned).is_empty());
}

// ---------------------------------------------------------------------------
// Departures
// ---------------------------------------------------------------------------

#[test]
fn test_leave_on_own_turn_passes_turn_to_successor() {
    let mut game = new_game(3);
    let seats = order(&game);
    let out = game.handle(seats[0], ClientMessage::Leave);
    assert!(game.player(seats[0]).is_none());
    assert_eq!(game.turn, Some(seats[1]));
    assert!(has_effect(&out, &Effect::RecordResult {
        player: seats[0],
        won: false
    }));
    assert!(has_effect(&out, &Effect::ClearLocation { player: seats[0] }));
    assert_invariants(&game);
}

#[test]
fn test_leave_two_player_game_ends_without_vote() {
    let mut game = new_game(2);
    let seats = order(&game);
    let out = game.handle(seats[1], ClientMessage::Leave);
    assert!(game.is_finished());
    assert_eq!(game.winner, Some(seats[0]));
    assert!(has_effect(&out, &Effect::RecordResult {
        player: seats[0],
        won: true
    }));
}

#[test]
fn test_force_remove_target_aborts_action() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);
    game.handle(x, declare(ActionKind::Steal, Some(y)));

    game.force_remove(y, Departure::Banned);
    assert!(game.action.is_none());
    assert_eq!(game.turn, Some(z));
    assert_eq!(coins(&game, x), 2);
    assert!(game.history().iter().any(|l| l.contains("banned by an administrator")));
    assert_invariants(&game);
}

#[test]
fn test_force_remove_last_responder_settles_window() {
    let mut game = new_game(3);
    let seats = order(&game);
    let (x, y, z) = (seats[0], seats[1], seats[2]);
    game.handle(x, declare(ActionKind::ForeignAid, None));
    game.handle(y, ClientMessage::Pass);

    game.force_remove(z, Departure::Deleted);
    assert_eq!(coins(&game, x), 4);
    assert_eq!(game.turn, Some(y));
    assert!(game.history().iter().any(|l| l.contains("deleted")));
    assert_invariants(&game);
}

#[test]
fn test_force_remove_during_exchange_returns_drawn_cards() {
    let mut game = new_game(3);
    let seats = order(&game);
    game.handle(seats[0], declare(ActionKind::Exchange, None));
    expire(&mut game);
    assert!(matches!(game.phase, Phase::AwaitingExchangeSelection(_)));

    game.force_remove(seats[0], Departure::Banned);
    assert_eq!(game.turn, Some(seats[1]));
    assert_eq!(game.deck.len(), Card::DECK_SIZE - 4);
    assert_invariants(&game);
}

// ---------------------------------------------------------------------------
// Ticks, chat and history
// ---------------------------------------------------------------------------

#[test]
fn test_tick_broadcasts_countdown_snapshot() {
    let mut game = new_game(2);
    let out = game.tick();
    let snapshot = out
        .messages
        .iter()
        .find_map(|(_, m)| match m {
            ServerMessage::State(s) => Some(s),
            _ => None,
        })
        .unwrap();
    assert_eq!(snapshot.timers.turn, 29);
    assert_eq!(snapshot.timers.popup, 0);
}

#[test]
fn test_chat_trims_and_keeps_last_thirty() {
    let mut game = new_game(2);
    let p = order(&game)[0];
    assert!(
        game.handle(p, ClientMessage::Chat { message: "   ".into() })
            .is_empty()
    );
    let out = game.handle(p, ClientMessage::Chat { message: "  hi  ".into() });
    assert!(out.messages.iter().any(|(to, m)| *to == Recipient::All
        && matches!(m, ServerMessage::Chat(entry) if entry.message == "hi" && entry.sender == game.name_of(p))));
    for i in 0..40 {
        game.handle(p, ClientMessage::Chat { message: format!("m{i}") });
    }
    let log = game.chat_log();
    assert_eq!(log.len(), 30);
    assert_eq!(log.last().unwrap().message, "m39");
    assert!(game.handle(PlayerId(99), ClientMessage::Chat { message: "x".into() }).is_empty());
}

#[test]
fn test_history_keeps_last_five() {
    let mut game = new_game(2);
    for _ in 0..8 {
        let turn = game.turn.unwrap();
        game.handle(turn, declare(ActionKind::Income, None));
    }
    let history = game.history();
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|l| l.contains("took income")));
}

// ---------------------------------------------------------------------------
// Invariants under arbitrary play
// ---------------------------------------------------------------------------

fn random_message(game: &Game, rng: &mut StdRng) -> ClientMessage {
    let targets: Vec<PlayerId> = game.players.iter().map(|p| p.id).collect();
    let card = *Card::ALL.choose(rng).unwrap();
    match rng.random_range(0..10) {
        0 | 1 => declare(
            *ActionKind::ALL.choose(rng).unwrap(),
            targets.choose(rng).copied(),
        ),
        2 => ClientMessage::Block {
            action: *ActionKind::ALL.choose(rng).unwrap(),
            card: if rng.random_bool(0.5) { Some(card) } else { None },
        },
        3 => ClientMessage::Challenge,
        4 => ClientMessage::ShowCard { card },
        5 => ClientMessage::DropCard { card },
        6 => ClientMessage::ConfirmExchange {
            keep: (0..rng.random_range(1..3))
                .map(|_| *Card::ALL.choose(rng).unwrap())
                .collect(),
        },
        _ => ClientMessage::Pass,
    }
}

#[test]
fn test_handle_random_play_keeps_invariants() {
    let mut rng = StdRng::seed_from_u64(7);
    for round in 0..20u64 {
        let n = 2 + round % 5;
        let config = GameConfig {
            seed: Some(round),
            ..GameConfig::default()
        };
        let mut game = Game::new(GameId(round), RoomId(round), seats(n), config).unwrap();
        let mut steps = 0;
        while !game.is_finished() && steps < 2_000 {
            if rng.random_bool(0.3) {
                game.tick();
            } else {
                let sender = game.players.choose(&mut rng).map(|p| p.id).unwrap();
                let message = random_message(&game, &mut rng);
                game.handle(sender, message);
            }
            assert_invariants(&game);
            if !game.is_finished() {
                let voting = matches!(game.phase, Phase::AwaitingVotes);
                assert_eq!(voting, game.winner.is_some());
                if !voting {
                    assert!(game.alive().len() >= 2);
                }
            }
            steps += 1;
        }
    }
}
