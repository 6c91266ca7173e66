//! The cadence that drives a session's countdowns.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Configuration for a [`Ticker`].
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Time between ticks. Countdowns are specified in whole seconds, so
    /// anything other than one second is only useful in tests.
    pub period: Duration,
    /// Random jitter (0–max µs) added to the *first* tick so sessions
    /// activated in the same instant don't all wake together.
    pub initial_jitter_us: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            initial_jitter_us: 2_000,
        }
    }
}

/// Information about a fired tick.
#[derive(Debug, Clone)]
pub struct Tick {
    /// Monotonically increasing tick number (starts at 1).
    pub number: u64,
}

/// Fixed-period ticker for one session actor.
///
/// Sits in a `tokio::select!` next to the actor's command channel:
///
/// ```ignore
/// loop {
///     tokio::select! {
///         Some(cmd) = rx.recv() => { /* player event */ }
///         _ = ticker.wait_for_tick() => { /* game.tick() */ }
///     }
/// }
/// ```
///
/// A late wake-up never produces a burst of catch-up ticks: a countdown
/// that loses a second to scheduler lag simply runs a second long.
pub struct Ticker {
    period: Duration,
    next: Instant,
    count: u64,
}

impl Ticker {
    pub fn new(config: TickerConfig) -> Self {
        let period = if config.period.is_zero() {
            warn!("ticker period of zero requested, using one second");
            Duration::from_secs(1)
        } else {
            config.period
        };
        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        debug!(period_ms = period.as_millis() as u64, "ticker created");
        Self {
            period,
            next: Instant::now() + period + jitter,
            count: 0,
        }
    }

    /// A one-second ticker with default jitter.
    pub fn every_second() -> Self {
        Self::new(TickerConfig::default())
    }

    /// Waits for the next tick.
    pub async fn wait_for_tick(&mut self) -> Tick {
        time::sleep_until(self.next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next);
        let skipped = (late_by.as_nanos() / self.period.as_nanos()) as u64;
        if skipped > 0 {
            warn!(
                tick = self.count + 1,
                skipped,
                late_ms = late_by.as_millis() as u64,
                "ticker overrun, skipping ahead"
            );
        }

        self.count += 1;
        self.next = now + self.period;
        trace!(tick = self.count, "tick fired");

        Tick { number: self.count }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
