//! # feed::mock
//!
//! Deterministic stand-in for the live stream, for development and tests.
//!
//! [`MockPriceGenerator`] is a seeded random walk with a trend bias:
//! each step moves the price by `U(-vol, vol) + bias × strength × vol`, where
//! the bias is +0.6 (bullish), −0.6 (bearish) or 0 (sideways). Every step has
//! a 10 % chance to roll a new regime and strength. Same seed, same series.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::MockSettings;
use crate::error::{DataError, FeedError};
use crate::feed::client::stopped;
use crate::feed::{ConnectionState, FeedStatus, PriceFeed};
use crate::models::PriceTick;

const REGIME_CHANGE_PROBABILITY: f64 = 0.1;
const MIN_PRICE: f64 = 0.000_001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    fn bias(&self) -> f64 {
        match self {
            Trend::Bullish  => 0.6,
            Trend::Bearish  => -0.6,
            Trend::Sideways => 0.0,
        }
    }

    fn random(rng: &mut StdRng) -> Self {
        match rng.gen_range(0..3) {
            0 => Trend::Bullish,
            1 => Trend::Bearish,
            _ => Trend::Sideways,
        }
    }
}

// ─── Generator ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MockPriceGenerator {
    rng:        StdRng,
    price:      f64,
    volatility: f64,
    trend:      Trend,
    strength:   f64,
}

impl MockPriceGenerator {
    pub fn new(seed: u64, base_price: f64, volatility: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let trend = Trend::random(&mut rng);
        let strength = rng.gen::<f64>();
        Self {
            rng,
            price: base_price,
            volatility: volatility.abs(),
            trend,
            strength,
        }
    }

    /// Force a regime, e.g. a steady bull run.
    #[cfg(test)]
    pub fn with_trend(mut self, trend: Trend, strength: f64) -> Self {
        self.trend = trend;
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// Next price, rounded to 6 decimals.
    pub fn next_price(&mut self) -> f64 {
        let vol = self.volatility;
        let noise = if vol > 0.0 { self.rng.gen_range(-vol..=vol) } else { 0.0 };
        let change = noise + self.trend.bias() * self.strength * vol;

        let next = (self.price * (1.0 + change) * 1e6).round() / 1e6;
        self.price = next.max(MIN_PRICE);

        if self.rng.gen_bool(REGIME_CHANGE_PROBABILITY) {
            self.trend = Trend::random(&mut self.rng);
            self.strength = self.rng.gen::<f64>();
        }
        self.price
    }

    /// `count` ticks spaced `step` apart, the newest stamped now.
    pub fn history(&mut self, count: usize, step: Duration) -> Vec<PriceTick> {
        let now = Utc::now();
        let step = chrono::Duration::from_std(step).unwrap_or_else(|_| chrono::Duration::zero());
        (0..count)
            .filter_map(|i| {
                let age = step * (count - 1 - i) as i32;
                PriceTick::new(self.next_price(), now - age).ok()
            })
            .collect()
    }
}

// ─── Feed ─────────────────────────────────────────────────────────────────────

/// [`PriceFeed`] driven by a [`MockPriceGenerator`]: one tick per interval.
pub struct MockFeed {
    generator:   Mutex<MockPriceGenerator>,
    history_len: usize,
    interval:    Duration,
    state:       watch::Sender<ConnectionState>,
    shutdown:    watch::Sender<bool>,
}

impl MockFeed {
    pub fn new(generator: MockPriceGenerator, history_len: usize, interval: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::disconnected());
        let (shutdown, _) = watch::channel(false);
        Self {
            generator: Mutex::new(generator),
            history_len,
            interval,
            state,
            shutdown,
        }
    }

    pub fn from_settings(settings: &MockSettings) -> Self {
        Self::new(
            MockPriceGenerator::new(settings.seed, settings.base_price, settings.volatility),
            settings.history_len,
            settings.tick_interval,
        )
    }

    fn next_tick(&self) -> Option<PriceTick> {
        let price = match self.generator.lock() {
            Ok(mut generator) => generator.next_price(),
            Err(poisoned) => poisoned.into_inner().next_price(),
        };
        PriceTick::now(price).ok()
    }

    fn set_status(&self, status: FeedStatus) {
        self.state.send_modify(|s| s.status = status);
    }
}

#[async_trait]
impl PriceFeed for MockFeed {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_history(&self) -> Result<Vec<PriceTick>, DataError> {
        let mut generator = self
            .generator
            .lock()
            .map_err(|_| DataError::Backfill("mock generator poisoned".into()))?;
        let ticks = generator.history(self.history_len, self.interval);
        debug!(count = ticks.len(), "mock history generated");
        Ok(ticks)
    }

    async fn run(&self, on_tick: mpsc::Sender<PriceTick>) -> Result<(), FeedError> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return Ok(());
        }

        self.state.send_replace(ConnectionState {
            status:             FeedStatus::Connected,
            reconnect_attempts: 0,
        });
        info!(interval_ms = self.interval.as_millis() as u64, "🎭 Mock price feed running");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stopped(&mut shutdown) => break,
            }

            let Some(tick) = self.next_tick() else { continue };
            if on_tick.send(tick).await.is_err() {
                break;
            }
        }

        self.set_status(FeedStatus::Disconnected);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    fn restart(&self) {
        self.shutdown.send_replace(false);
        self.state.send_replace(ConnectionState {
            status:             FeedStatus::Connecting,
            reconnect_attempts: 0,
        });
    }
}
