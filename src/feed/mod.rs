//! # feed — price sources
//!
//! ```text
//!            ┌──────────────────────────── PriceFeed ───────────────────────────┐
//!            │ fetch_history()  one-shot backfill                               │
//!            │ run(tx)          live loop, ticks → mpsc::Sender<PriceTick>      │
//!            │ stop()/restart() cancellation and recovery from `exhausted`      │
//!            └──────────────────────────────────────────────────────────────────┘
//!                 ▲                                     ▲
//!            MockFeed (seeded generator)          LiveFeed (FeedClient<WsConnector>)
//! ```
//!
//! The variant is picked once, in `state::build_state`; nothing downstream
//! checks a mode flag.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{DataError, FeedError};
use crate::models::PriceTick;

pub mod client;
pub mod frame;
pub mod history;
pub mod mock;
pub mod ws;

pub use client::{Connector, FeedClient, FrameStream, LiveFeed};
pub use history::HistorySource;
pub use mock::{MockFeed, MockPriceGenerator};
pub use ws::WsConnector;

// ─── Connection state ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Reconnection budget spent. Only `restart()` leaves this state.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub status:             FeedStatus,
    pub reconnect_attempts: u32,
}

impl ConnectionState {
    pub const fn disconnected() -> Self {
        Self { status: FeedStatus::Disconnected, reconnect_attempts: 0 }
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.status == FeedStatus::Exhausted
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::disconnected()
    }
}

// ─── Backoff ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every reconnect.
    Fixed(Duration),
    /// `base × 2^(attempt-1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before reconnect number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

// ─── Capability ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Short label for logs and the status endpoint.
    fn name(&self) -> &'static str;

    /// One-shot historical backfill, oldest first.
    async fn fetch_history(&self) -> Result<Vec<PriceTick>, DataError>;

    /// Push live ticks into `on_tick` until `stop()` is called or the
    /// receiver is dropped (`Ok`), or reconnection is exhausted (`Err`).
    async fn run(&self, on_tick: mpsc::Sender<PriceTick>) -> Result<(), FeedError>;

    fn state(&self) -> ConnectionState;

    /// Ask a running `run` to close its connection and return.
    fn stop(&self);

    /// Leave `exhausted` (or a stopped state): status back to
    /// `connecting`, attempts back to 0.
    fn restart(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_until_capped() {
        let b = Backoff::Exponential {
            base: Duration::from_millis(100),
            max:  Duration::from_millis(500),
        };
        assert_eq!(b.delay(1), Duration::from_millis(100));
        assert_eq!(b.delay(2), Duration::from_millis(200));
        assert_eq!(b.delay(3), Duration::from_millis(400));
        assert_eq!(b.delay(4), Duration::from_millis(500));
        assert_eq!(b.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn fixed_backoff_ignores_attempt() {
        let b = Backoff::Fixed(Duration::from_secs(5));
        assert_eq!(b.delay(1), b.delay(5));
    }
}
