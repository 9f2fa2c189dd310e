//! # state
//!
//! Shared application state handed to every Axum handler, the background
//! signal loop and the console surface.
//!
//! Feed and broker variants are chosen here, once, from [`Config`].
//! Everything downstream only sees `Arc<dyn PriceFeed>` / `Arc<dyn Broker>`.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::info;

use crate::broker::{AlpacaBroker, Broker, MockBroker};
use crate::config::{BrokerMode, Config, FeedMode};
use crate::engine::{SignalGenerator, TradeBook};
use crate::error::DecisionError;
use crate::events::WsEvent;
use crate::feed::{FeedClient, HistorySource, LiveFeed, MockFeed, PriceFeed, WsConnector};
use crate::models::{CycleResult, TradeDecision, TradeProposal};
use crate::result_log::ResultLog;

const BROADCAST_CAPACITY: usize = 256;

// ─── AppState ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub generator:    Arc<SignalGenerator>,
    pub trades:       Arc<TradeBook>,
    pub broker:       Arc<dyn Broker>,
    pub result_log:   ResultLog,

    /// Pre-serialized [`WsEvent`] JSON for `/ws/signals` clients.
    pub broadcast_tx: broadcast::Sender<String>,

    pub started_at:   Instant,
}

impl AppState {
    pub fn new(generator: Arc<SignalGenerator>, result_log: ResultLog) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let trades = generator.trades().clone();
        Self {
            broker: trades.broker().clone(),
            trades,
            generator,
            result_log,
            broadcast_tx,
            started_at: Instant::now(),
        }
    }

    /// Send to every WebSocket client. No listeners is fine.
    pub fn broadcast(&self, event: &WsEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }

    /// One full cycle as every surface runs it: generate, record, broadcast.
    pub async fn run_cycle(&self) -> CycleResult {
        let result = self.generator.generate_cycle().await;
        self.result_log.record(&result).await;
        self.broadcast(&WsEvent::CycleCompleted {
            result: Box::new(result.clone()),
        });
        result
    }

    /// Apply a decision and announce the outcome.
    pub async fn decide(&self, decision: &TradeDecision) -> Result<TradeProposal, DecisionError> {
        let trade = self.trades.decide(decision.id, decision.accepted()).await?;
        self.broadcast(&WsEvent::TradeResolved {
            trade: Box::new(trade.clone()),
        });
        Ok(trade)
    }
}

pub type SharedState = Arc<AppState>;

// ─── Wiring ───────────────────────────────────────────────────────────────────

/// Build feed, broker, trade book and generator from configuration.
pub fn build_state(config: &Config) -> SharedState {
    let http = reqwest::Client::new();

    let feed: Arc<dyn PriceFeed> = match &config.feed.mode {
        FeedMode::Mock => {
            info!(seed = config.mock.seed, base = config.mock.base_price, "🎭 Feed: MOCK generator");
            Arc::new(MockFeed::from_settings(&config.mock))
        }
        FeedMode::Live { ws_url } => {
            let history = match &config.feed.history_url {
                Some(url) => HistorySource::http(http.clone(), url),
                None => HistorySource::generated(&config.mock),
            };
            let client = FeedClient::new(
                WsConnector::new(ws_url),
                &config.feed.asset_address,
                config.feed.max_reconnects,
                config.feed.backoff,
            );
            info!(asset = %config.feed.asset_address, "📡 Feed: LIVE WebSocket");
            Arc::new(LiveFeed::new(client, history))
        }
    };

    let broker: Arc<dyn Broker> = match &config.broker.mode {
        BrokerMode::Mock => {
            let symbol = config.signal.asset.split('/').next().unwrap_or(&config.signal.asset);
            Arc::new(MockBroker::new(symbol, config.mock.base_price))
        }
        BrokerMode::Alpaca { api_key, api_secret, base_url } => {
            Arc::new(AlpacaBroker::new(http, base_url.clone(), api_key.clone(), api_secret.clone()))
        }
    };
    info!(broker = broker.name(), "🏦 Broker ready");

    let trades = Arc::new(TradeBook::new(
        broker,
        config.signal.asset.clone(),
        config.signal.quantity,
        config.broker.timeout,
    ).with_retention(config.signal.retention));
    let generator = Arc::new(SignalGenerator::new(
        feed,
        config.indicator,
        trades,
        config.signal.warmup_timeout,
    ));

    Arc::new(AppState::new(generator, ResultLog::new(config.result_log_dir.clone())))
}
