//! Phase timers for Bluffline sessions.
//!
//! Every session carries five named countdowns ([`TimerKind`]) in a
//! [`TimerBank`], and a [`Ticker`] that fires once per second inside the
//! session actor's `select!` loop. Each tick advances the bank; expired
//! countdowns come back as [`Expired`] records for the engine to resolve.
//!
//! Cancellation is purely internal: the engine disarms a timer when the
//! phase it guards is left. Nothing outside the session can cancel one.

mod ticker;
mod timer;

pub use ticker::{Tick, Ticker, TickerConfig};
pub use timer::{Countdown, Expired, TimerBank, TimerKind};
