//! The court deck.
//!
//! Draws come off the front. Cards lost to a challenge or a hit go back
//! on the front and stay where they are until the next shuffle; cards
//! returned from an exchange go on the back and are shuffled in straight
//! away.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::Card;

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    /// A full, unshuffled deck: [`Card::COPIES`] of every kind.
    pub fn full() -> Self {
        let cards = Card::ALL
            .iter()
            .flat_map(|card| std::iter::repeat_n(*card, Card::COPIES))
            .collect();
        Self { cards }
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.make_contiguous().shuffle(rng);
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop_front()
    }

    /// Draws up to `n` cards; fewer if the deck runs out.
    pub fn draw_many(&mut self, n: usize) -> Vec<Card> {
        let n = n.min(self.cards.len());
        self.cards.drain(..n).collect()
    }

    pub fn put_front(&mut self, card: Card) {
        self.cards.push_front(card);
    }

    pub fn put_back(&mut self, card: Card) {
        self.cards.push_back(card);
    }

    /// Pulls the first copy of `card` out of the deck.
    #[cfg(test)]
    pub(crate) fn take(&mut self, card: Card) -> Option<Card> {
        let pos = self.cards.iter().position(|c| *c == card)?;
        self.cards.remove(pos)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn count(&self, card: Card) -> usize {
        self.cards.iter().filter(|c| **c == card).count()
    }

    pub fn peek_front(&self) -> Option<Card> {
        self.cards.front().copied()
    }
}
