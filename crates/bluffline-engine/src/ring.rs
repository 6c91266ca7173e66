//! Seating order.

use bluffline_protocol::PlayerId;

/// The fixed seating order of a session.
///
/// Turn succession walks the ring from the current seat and skips anyone
/// the caller reports as not alive. Removing a seat never shifts anyone
/// else's position relative to the others, so the successor of a
/// departing player can be computed before they are removed and stays
/// valid afterwards.
#[derive(Debug, Clone, Default)]
pub struct TurnRing {
    seats: Vec<PlayerId>,
}

impl TurnRing {
    pub fn new(seats: Vec<PlayerId>) -> Self {
        Self { seats }
    }

    /// The first seat after `current` for which `eligible` holds.
    ///
    /// Wraps around, so `current` itself comes last and is returned only
    /// when it is the sole eligible seat. If `current` is not seated the
    /// walk starts from the top of the ring.
    pub fn next_after(
        &self,
        current: PlayerId,
        eligible: impl Fn(PlayerId) -> bool,
    ) -> Option<PlayerId> {
        let len = self.seats.len();
        let start = match self.seats.iter().position(|p| *p == current) {
            Some(pos) => pos + 1,
            None => 0,
        };
        (0..len)
            .map(|offset| self.seats[(start + offset) % len])
            .find(|p| eligible(*p))
    }

    /// The first eligible seat from the top of the ring.
    pub fn first(&self, eligible: impl Fn(PlayerId) -> bool) -> Option<PlayerId> {
        self.seats.iter().copied().find(|p| eligible(*p))
    }

    pub fn remove(&mut self, player: PlayerId) -> bool {
        let before = self.seats.len();
        self.seats.retain(|p| *p != player);
        self.seats.len() != before
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.seats.contains(&player)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.seats.iter().copied()
    }
}
