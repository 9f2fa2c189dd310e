//! # engine::indicator
//!
//! **Indicator Engine**: MA-crossover over a bounded price history.
//!
//! ```text
//!  add_tick ──▶ ring buffer (capacity ≥ long_window)
//!                 │
//!                 ▼
//!  recommend ──▶ short_ma / long_ma ──▶ buy | sell | hold + confidence
//! ```
//!
//! Each average is summed fresh over its window on every query. No running
//! sum survives between calls, so one extreme tick cannot leave a rounding
//! offset behind once it has scrolled out.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::trace;

use crate::error::{ConfigError, DataError};
use crate::models::{Action, PriceTick, Recommendation};

pub const DEFAULT_SHORT_WINDOW: usize = 50;
pub const DEFAULT_LONG_WINDOW: usize = 200;
pub const DEFAULT_CAPACITY: usize = 1000;

const TAKE_PROFIT_PCT: f64 = 0.05;

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorConfig {
    short_window: usize,
    long_window:  usize,
    capacity:     usize,
}

impl IndicatorConfig {
    /// Fails fast when `0 < short < long` does not hold: such an engine would
    /// sit in "insufficient data" forever on any realistic feed.
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, ConfigError> {
        if short_window == 0 || short_window >= long_window {
            return Err(ConfigError::InvalidWindows {
                short: short_window,
                long:  long_window,
            });
        }
        Ok(Self {
            short_window,
            long_window,
            capacity: DEFAULT_CAPACITY.max(long_window),
        })
    }

    /// Retention never drops below `long_window`.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(self.long_window);
        self
    }

    pub fn short_window(&self) -> usize { self.short_window }
    pub fn long_window(&self) -> usize { self.long_window }
    pub fn capacity(&self) -> usize { self.capacity }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window:  DEFAULT_LONG_WINDOW,
            capacity:     DEFAULT_CAPACITY,
        }
    }
}

// ─── Engine ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config:    IndicatorConfig,
    /// Oldest at the front, newest at the back.
    ticks:     VecDeque<PriceTick>,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            ticks:     VecDeque::with_capacity(config.capacity + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn last(&self) -> Option<&PriceTick> {
        self.ticks.back()
    }

    /// Append a price observed right now.
    pub fn add_price(&mut self, value: f64) -> Result<(), DataError> {
        let tick = PriceTick::new(value, Utc::now())?;
        self.add_tick(tick)
    }

    /// Append a timestamped tick. Rejects invalid prices and ticks older than
    /// the newest one already held.
    pub fn add_tick(&mut self, tick: PriceTick) -> Result<(), DataError> {
        if !tick.value.is_finite() || tick.value <= 0.0 {
            return Err(DataError::InvalidPrice(tick.value));
        }
        if let Some(last) = self.ticks.back() {
            if tick.timestamp < last.timestamp {
                return Err(DataError::OutOfOrder {
                    last: last.timestamp,
                    got:  tick.timestamp,
                });
            }
        }

        self.ticks.push_back(tick);

        // Evicted ticks are already outside both windows.
        while self.ticks.len() > self.config.capacity {
            self.ticks.pop_front();
        }

        trace!(price = tick.value, len = self.ticks.len(), "tick appended");
        Ok(())
    }

    /// Mean of the newest `window` prices, `None` while history is shorter.
    pub fn moving_average(&self, window: usize) -> Option<f64> {
        if window == 0 || self.ticks.len() < window {
            return None;
        }
        let sum: f64 = self.ticks.iter().rev().take(window).map(|t| t.value).sum();
        Some(sum / window as f64)
    }

    /// Evaluate the crossover rule on the current history.
    pub fn recommend(&self) -> Recommendation {
        let (Some(short_ma), Some(long_ma)) = (
            self.moving_average(self.config.short_window),
            self.moving_average(self.config.long_window),
        ) else {
            return Recommendation::insufficient_data();
        };
        let len = self.ticks.len();

        // short < long guarantees long_window >= 2, so both exist.
        let current  = self.ticks[len - 1].value;
        let previous = self.ticks[len - 2].value;

        let confidence = confidence(short_ma, long_ma);

        let (action, reasoning, take_profit) = if short_ma > long_ma && current > previous {
            (
                Action::Buy,
                format!(
                    "Short-term MA ({short_ma:.4}) above long-term MA ({long_ma:.4}), price increasing"
                ),
                Some(current * (1.0 + TAKE_PROFIT_PCT)),
            )
        } else if short_ma < long_ma && current < previous {
            (
                Action::Sell,
                format!(
                    "Short-term MA ({short_ma:.4}) below long-term MA ({long_ma:.4}), price decreasing"
                ),
                Some(current * (1.0 - TAKE_PROFIT_PCT)),
            )
        } else {
            (Action::Hold, "No clear trend detected".to_string(), None)
        };

        Recommendation {
            action,
            reasoning,
            entry_price: take_profit.map(|_| current),
            take_profit,
            confidence,
            short_ma: Some(short_ma),
            long_ma:  Some(long_ma),
            timestamp: Utc::now(),
        }
    }
}

/// Placeholder heuristic: 0.7 plus the relative MA divergence, clamped to
/// `[0.5, 0.95]`. Monotonic in the divergence, nothing more.
pub fn confidence(short_ma: f64, long_ma: f64) -> f64 {
    let divergence = (short_ma - long_ma).abs() / long_ma;
    (0.7 + divergence).clamp(0.5, 0.95)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
