//! # feed::history
//!
//! Backfill for the live feed.
//!
//! 1. `HISTORY_URL` set → `GET` it, expect `[{"value": 0.0751, "timestamp": "…"}, …]`
//!    (`price` is accepted in place of `value`, numeric strings count,
//!    `timestamp` is optional). Unusable entries are dropped one by one.
//! 2. Not set → seeded mock generator, so a dev box still gets a warm engine
//!
//! History never claims to be newer than the local clock: live ticks are
//! stamped locally, and a server running ahead would otherwise make every one
//! of them look out of order.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MockSettings;
use crate::error::DataError;
use crate::feed::frame::as_number;
use crate::feed::MockPriceGenerator;
use crate::models::PriceTick;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

pub enum HistorySource {
    Http {
        client: reqwest::Client,
        url:    String,
    },
    Generated {
        generator: Mutex<MockPriceGenerator>,
        count:     usize,
        step:      Duration,
    },
}

impl HistorySource {
    pub fn http(client: reqwest::Client, url: impl Into<String>) -> Self {
        HistorySource::Http { client, url: url.into() }
    }

    pub fn generated(settings: &MockSettings) -> Self {
        HistorySource::Generated {
            generator: Mutex::new(MockPriceGenerator::new(
                settings.seed,
                settings.base_price,
                settings.volatility,
            )),
            count: settings.history_len,
            step:  settings.tick_interval,
        }
    }

    /// Ticks ordered oldest first.
    pub async fn fetch(&self) -> Result<Vec<PriceTick>, DataError> {
        match self {
            HistorySource::Http { client, url } => fetch_http(client, url).await,
            HistorySource::Generated { generator, count, step } => {
                warn!("HISTORY_URL not set — backfilling with MOCK prices");
                let mut generator = generator
                    .lock()
                    .map_err(|_| DataError::Backfill("mock generator poisoned".into()))?;
                Ok(generator.history(*count, *step))
            }
        }
    }
}

async fn fetch_http(client: &reqwest::Client, url: &str) -> Result<Vec<PriceTick>, DataError> {
    let points: Vec<Value> = client
        .get(url)
        .timeout(HTTP_TIMEOUT)
        .send()
        .await
        .map_err(|e| DataError::Backfill(format!("history API unreachable: {e}")))?
        .error_for_status()
        .map_err(|e| DataError::Backfill(e.to_string()))?
        .json()
        .await
        .map_err(|e| DataError::Backfill(format!("history API response invalid: {e}")))?;

    let ticks = to_ticks(points, Utc::now());
    debug!(count = ticks.len(), "history fetched");
    Ok(ticks)
}

/// Drop unusable entries, order by time and clamp to `now`. Points without a
/// timestamp are stamped one second apart by position, ending at `now`.
fn to_ticks(points: Vec<Value>, now: DateTime<Utc>) -> Vec<PriceTick> {
    let n = points.len();
    let mut ticks: Vec<PriceTick> = points
        .iter()
        .enumerate()
        .filter_map(|(i, point)| {
            let fallback = now - chrono::Duration::seconds((n - 1 - i) as i64);
            match to_tick(point, fallback) {
                Ok(tick) => Some(tick),
                Err(reason) => {
                    warn!(index = i, %reason, "history entry dropped");
                    None
                }
            }
        })
        .collect();

    ticks.sort_by_key(|t| t.timestamp);

    let ahead = ticks.iter().filter(|t| t.timestamp > now).count();
    if ahead > 0 {
        warn!(ahead, "history timestamps ahead of the local clock, clamped to now");
        for tick in ticks.iter_mut().filter(|t| t.timestamp > now) {
            tick.timestamp = now;
        }
    }
    ticks
}

fn to_tick(point: &Value, fallback: DateTime<Utc>) -> Result<PriceTick, String> {
    let value = point
        .get("value")
        .or_else(|| point.get("price"))
        .and_then(as_number)
        .ok_or("price missing or not numeric")?;

    let timestamp = match point.get("timestamp") {
        None | Some(Value::Null) => fallback,
        Some(raw) => serde_json::from_value::<DateTime<Utc>>(raw.clone())
            .map_err(|e| format!("bad timestamp: {e}"))?,
    };

    PriceTick::new(value, timestamp).map_err(|e| e.to_string())
}
