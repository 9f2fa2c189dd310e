//! # models::tick
//!
//! Defines [`PriceTick`], one timestamped price observation from the stream
//! or from the historical backfill.
//!
//! The struct is `Copy`: the ingestion path moves thousands of these through
//! a channel and into the ring buffer without heap allocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// A single validated price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Quoted price. Always positive and finite.
    pub value: f64,

    /// UTC instant the price was observed.
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    /// Build a tick, rejecting non-positive or non-finite prices.
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Result<Self, DataError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DataError::InvalidPrice(value));
        }
        Ok(Self { value, timestamp })
    }

    /// Tick stamped with the current wall-clock time.
    #[inline]
    pub fn now(value: f64) -> Result<Self, DataError> {
        Self::new(value, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_non_finite_prices() {
        for bad in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            assert!(PriceTick::now(bad).is_err(), "{bad} should be rejected");
        }
        assert_eq!(PriceTick::now(0.075).map(|t| t.value), Ok(0.075));
    }
}
