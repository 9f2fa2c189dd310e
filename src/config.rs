//! # config — settings from environment variables
//!
//! `.env` is loaded by `main` through `dotenvy` before [`Config::from_env`]
//! runs. Every setting has a default except the credentials of the live
//! integrations, which are only required when those integrations are
//! selected.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::indicator::{IndicatorConfig, DEFAULT_CAPACITY, DEFAULT_LONG_WINDOW, DEFAULT_SHORT_WINDOW};
use crate::error::ConfigError;
use crate::feed::Backoff;

pub const DEFAULT_ASSET_ADDRESS: &str = "D8U9GxmBGs98geNjWkrYf4GUjHqDvMgG5XdL41TXpump";
pub const DEFAULT_ALPACA_URL: &str = "https://paper-api.alpaca.markets/v2";

// ─── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMode {
    /// Seeded trend generator. No network.
    Mock,
    /// WebSocket subscription to `ws_url`.
    Live { ws_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub mode:           FeedMode,
    pub asset_address:  String,
    pub max_reconnects: u32,
    pub backoff:        Backoff,
    /// Backfill endpoint for the live feed. Mock history when unset.
    pub history_url:    Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockSettings {
    pub seed:          u64,
    pub base_price:    f64,
    pub volatility:    f64,
    pub history_len:   usize,
    pub tick_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSettings {
    /// Symbol shown on proposals and sent to the broker.
    pub asset:          String,
    pub quantity:       f64,
    /// Upper bound on the wait for a live tick before recommending.
    pub warmup_timeout: Duration,
    /// Period of the background signal loop.
    pub interval:       Duration,
    /// Age after which resolved or unanswered proposals are forgotten.
    pub retention:      Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrokerMode {
    Mock,
    Alpaca {
        api_key:    String,
        api_secret: String,
        base_url:   String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub mode:    BrokerMode,
    pub timeout: Duration,
}

/// Everything the service needs at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:         SocketAddr,
    pub feed:              FeedSettings,
    pub mock:              MockSettings,
    pub indicator:         IndicatorConfig,
    pub signal:            SignalSettings,
    pub broker:            BrokerSettings,
    pub result_log_dir:    PathBuf,
    pub console_decisions: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes `std::env::var`; tests
    /// pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        // ── Feed ──────────────────────────────────────────────────────────────
        let mode = match env.string("FEED_MODE", "mock").to_lowercase().as_str() {
            "mock" => FeedMode::Mock,
            "live" => FeedMode::Live {
                ws_url: env.required("FEED_WS_URL")?,
            },
            other => {
                return Err(ConfigError::Invalid { key: "FEED_MODE", value: other.to_string() })
            }
        };

        let delay = Duration::from_millis(env.parse("FEED_RECONNECT_DELAY_MS", 5_000u64)?);
        let backoff = match env.string("FEED_BACKOFF", "fixed").to_lowercase().as_str() {
            "fixed" => Backoff::Fixed(delay),
            "exponential" => Backoff::Exponential {
                base: delay,
                max:  Duration::from_millis(env.parse("FEED_BACKOFF_MAX_MS", 60_000u64)?),
            },
            other => {
                return Err(ConfigError::Invalid { key: "FEED_BACKOFF", value: other.to_string() })
            }
        };

        let max_reconnects: u32 = env.parse("FEED_MAX_RECONNECTS", 5)?;
        if max_reconnects == 0 {
            return Err(ConfigError::Invalid { key: "FEED_MAX_RECONNECTS", value: "0".into() });
        }

        let feed = FeedSettings {
            mode,
            asset_address: env.string("FEED_ASSET_ADDRESS", DEFAULT_ASSET_ADDRESS),
            max_reconnects,
            backoff,
            history_url: env.optional("HISTORY_URL"),
        };

        // ── Mock generator ────────────────────────────────────────────────────
        let mock = MockSettings {
            seed:          env.parse("MOCK_SEED", 42u64)?,
            base_price:    env.parse("MOCK_BASE_PRICE", 0.075f64)?,
            volatility:    env.parse("MOCK_VOLATILITY", 0.02f64)?,
            history_len:   env.parse("MOCK_HISTORY_LEN", 250usize)?,
            tick_interval: Duration::from_millis(env.parse("MOCK_TICK_INTERVAL_MS", 500u64)?),
        };
        if mock.tick_interval.is_zero() {
            return Err(ConfigError::Invalid { key: "MOCK_TICK_INTERVAL_MS", value: "0".into() });
        }
        if !(mock.base_price.is_finite() && mock.base_price > 0.0) {
            return Err(ConfigError::Invalid {
                key:   "MOCK_BASE_PRICE",
                value: mock.base_price.to_string(),
            });
        }

        // ── Indicator ─────────────────────────────────────────────────────────
        let indicator = IndicatorConfig::new(
            env.parse("INDICATOR_SHORT_WINDOW", DEFAULT_SHORT_WINDOW)?,
            env.parse("INDICATOR_LONG_WINDOW", DEFAULT_LONG_WINDOW)?,
        )?
        .with_capacity(env.parse("INDICATOR_CAPACITY", DEFAULT_CAPACITY)?);

        // ── Signal cycle ──────────────────────────────────────────────────────
        let signal = SignalSettings {
            asset:          env.string("SIGNAL_ASSET", "EMB/USD"),
            quantity:       env.parse("SIGNAL_QUANTITY", 100.0f64)?,
            warmup_timeout: Duration::from_millis(env.parse("SIGNAL_WARMUP_MS", 1_000u64)?),
            interval:       Duration::from_secs(env.parse("SIGNAL_INTERVAL_SECS", 10u64)?),
            retention:      Duration::from_secs(env.parse("SIGNAL_TRADE_RETENTION_SECS", 86_400u64)?),
        };
        if signal.interval.is_zero() {
            return Err(ConfigError::Invalid { key: "SIGNAL_INTERVAL_SECS", value: "0".into() });
        }
        if signal.retention.is_zero() {
            return Err(ConfigError::Invalid { key: "SIGNAL_TRADE_RETENTION_SECS", value: "0".into() });
        }

        // ── Broker ────────────────────────────────────────────────────────────
        let broker_mode = match env.string("BROKER_MODE", "mock").to_lowercase().as_str() {
            "mock" => BrokerMode::Mock,
            "alpaca" => BrokerMode::Alpaca {
                api_key:    env.required("ALPACA_API_KEY")?,
                api_secret: env.required("ALPACA_API_SECRET")?,
                base_url:   env.string("ALPACA_BASE_URL", DEFAULT_ALPACA_URL),
            },
            other => {
                return Err(ConfigError::Invalid { key: "BROKER_MODE", value: other.to_string() })
            }
        };
        let broker = BrokerSettings {
            mode:    broker_mode,
            timeout: Duration::from_millis(env.parse("BROKER_TIMEOUT_MS", 5_000u64)?),
        };

        // ── Surfaces ──────────────────────────────────────────────────────────
        let bind_addr = env.parse("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let console_decisions = env
            .optional("CONSOLE_DECISIONS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            feed,
            mock,
            indicator,
            signal,
            broker,
            result_log_dir: PathBuf::from(env.string("RESULT_LOG_DIR", "trades")),
            console_decisions,
        })
    }
}

// ─── Lookup helpers ───────────────────────────────────────────────────────────

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and empty are the same thing.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value: raw }),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_describe_a_mock_setup() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.feed.mode, FeedMode::Mock);
        assert_eq!(cfg.feed.max_reconnects, 5);
        assert_eq!(cfg.feed.backoff, Backoff::Fixed(Duration::from_secs(5)));
        assert_eq!(cfg.indicator.short_window(), 50);
        assert_eq!(cfg.indicator.long_window(), 200);
        assert_eq!(cfg.signal.asset, "EMB/USD");
        assert_eq!(cfg.signal.warmup_timeout, Duration::from_secs(1));
        assert_eq!(cfg.signal.retention, Duration::from_secs(86_400));
        assert_eq!(cfg.broker.mode, BrokerMode::Mock);
        assert_eq!(cfg.mock.history_len, 250);
        assert!(!cfg.console_decisions);
    }

    #[test]
    fn live_feed_requires_a_url() {
        let err = config_from(&[("FEED_MODE", "live")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("FEED_WS_URL"));

        let cfg = config_from(&[("FEED_MODE", "live"), ("FEED_WS_URL", "wss://example.test")]).unwrap();
        assert_eq!(cfg.feed.mode, FeedMode::Live { ws_url: "wss://example.test".into() });
    }

    #[test]
    fn alpaca_requires_credentials() {
        let err = config_from(&[("BROKER_MODE", "alpaca"), ("ALPACA_API_KEY", "k")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("ALPACA_API_SECRET"));
    }

    #[test]
    fn invalid_windows_fail_fast() {
        let err = config_from(&[
            ("INDICATOR_SHORT_WINDOW", "200"),
            ("INDICATOR_LONG_WINDOW", "50"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidWindows { short: 200, long: 50 });
    }

    #[test]
    fn garbage_numbers_are_reported_with_their_key() {
        let err = config_from(&[("FEED_MAX_RECONNECTS", "lots")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid { key: "FEED_MAX_RECONNECTS", value: "lots".into() }
        );
    }

    #[test]
    fn exponential_backoff_is_selectable() {
        let cfg = config_from(&[
            ("FEED_BACKOFF", "exponential"),
            ("FEED_RECONNECT_DELAY_MS", "100"),
            ("FEED_BACKOFF_MAX_MS", "800"),
        ])
        .unwrap();
        assert_eq!(
            cfg.feed.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(100),
                max:  Duration::from_millis(800),
            }
        );
    }
}
