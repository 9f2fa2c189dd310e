//! # engine::signal
//!
//! **Signal Generator** — one call to [`SignalGenerator::generate_cycle`]
//! produces exactly one [`CycleResult`].
//!
//! ```text
//!   feed.run(tx) ──mpsc──▶ ingest task ──write──▶ RwLock<IndicatorEngine>
//!        (long-lived, respawned when it ends)          │ read
//!                                                      ▼
//!   generate_cycle: backfill? → ensure feed → warm-up → recommend → propose
//! ```
//!
//! The ingest task is the only writer of the engine once it is seeded.
//! Cycles are serialized by the runtime mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::indicator::{IndicatorConfig, IndicatorEngine};
use crate::engine::lifecycle::TradeBook;
use crate::error::FeedError;
use crate::feed::{ConnectionState, PriceFeed};
use crate::models::{CycleResult, PriceTick};

const TICK_CHANNEL_CAPACITY: usize = 1024;

/// Feed + ingest tasks and whether the engine holds backfilled history.
#[derive(Default)]
struct Runtime {
    seeded: bool,
    feed:   Option<JoinHandle<Result<(), FeedError>>>,
    ingest: Option<JoinHandle<()>>,
}

impl Runtime {
    fn feed_running(&self) -> bool {
        self.feed.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for both tasks after the feed was told to stop.
    async fn join(&mut self) {
        if let Some(handle) = self.feed.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "feed task ended abnormally");
            }
        }
        if let Some(handle) = self.ingest.take() {
            let _ = handle.await;
        }
    }
}

pub struct SignalGenerator {
    feed:           Arc<dyn PriceFeed>,
    engine:         Arc<RwLock<IndicatorEngine>>,
    indicator:      IndicatorConfig,
    trades:         Arc<TradeBook>,
    warmup_timeout: Duration,
    /// Count of live ticks accepted by the engine.
    ticks_seen:     Arc<watch::Sender<u64>>,
    runtime:        Mutex<Runtime>,
    stopped:        AtomicBool,
}

impl SignalGenerator {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        indicator: IndicatorConfig,
        trades: Arc<TradeBook>,
        warmup_timeout: Duration,
    ) -> Self {
        let (ticks_seen, _) = watch::channel(0);
        Self {
            feed,
            engine: Arc::new(RwLock::new(IndicatorEngine::new(indicator))),
            indicator,
            trades,
            warmup_timeout,
            ticks_seen: Arc::new(ticks_seen),
            runtime: Mutex::new(Runtime::default()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn trades(&self) -> &Arc<TradeBook> {
        &self.trades
    }

    pub fn feed_name(&self) -> &'static str {
        self.feed.name()
    }

    pub fn feed_state(&self) -> ConnectionState {
        self.feed.state()
    }

    /// Prices currently held by the engine.
    pub async fn history_len(&self) -> usize {
        self.engine.read().await.len()
    }

    pub async fn last_price(&self) -> Option<f64> {
        self.engine.read().await.last().map(|t| t.value)
    }

    pub fn live_ticks(&self) -> u64 {
        *self.ticks_seen.borrow()
    }

    /// Run one signal cycle. Never panics, never returns an error: failures
    /// come back as [`CycleResult::Error`].
    pub async fn generate_cycle(&self) -> CycleResult {
        if self.stopped.load(Ordering::SeqCst) {
            return CycleResult::error("Signal generator is stopped");
        }

        let mut runtime = self.runtime.lock().await;

        // ── 1. Backfill (first cycle / after a feed restart) ─────────────────
        if !runtime.seeded {
            if let Err(message) = self.backfill().await {
                error!(%message, "❌ Backfill failed");
                return CycleResult::error(message);
            }
            runtime.seeded = true;
        }

        // ── 2. Make sure the live feed is running ────────────────────────────
        let feed_up = self.ensure_feed(&mut runtime);

        // ── 3. Warm-up: wait for one fresh live tick ─────────────────────────
        let live = feed_up && self.await_live_tick().await;
        if !live {
            warn!(feed = self.feed.name(), state = ?self.feed.state(), "No live tick this cycle — using history only");
        }

        // ── 4. Recommend ─────────────────────────────────────────────────────
        let rec = self.engine.read().await.recommend();
        debug!(action = ?rec.action, confidence = rec.confidence, short_ma = ?rec.short_ma, long_ma = ?rec.long_ma, "recommendation");

        if !rec.is_actionable() {
            info!(reason = %rec.reasoning, "⏸️  No trade this cycle");
            return CycleResult::NoTrade {
                message:   rec.reasoning,
                timestamp: rec.timestamp,
                live,
            };
        }

        // ── 5. Propose ───────────────────────────────────────────────────────
        match self.trades.propose(&rec).await {
            Ok(trade) => CycleResult::TradePrompt {
                confidence: trade.confidence,
                trade:      Box::new(trade),
                live,
            },
            Err(e) => CycleResult::error(format!("Could not create trade proposal: {e}")),
        }
    }

    /// Stop the feed and wait for its tasks. Later cycles return an error.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.feed.stop();
        self.runtime.lock().await.join().await;
        info!("🛑 Signal generator stopped");
    }

    /// Tear down the current feed and clear an `exhausted` state. The next
    /// cycle backfills again and respawns the feed.
    pub async fn restart_feed(&self) -> ConnectionState {
        let mut runtime = self.runtime.lock().await;
        self.feed.stop();
        runtime.join().await;
        runtime.seeded = false;
        self.feed.restart();
        info!(feed = self.feed.name(), "🔄 Feed reset — next cycle reconnects");
        self.feed.state()
    }

    // ─── internals ────────────────────────────────────────────────────────────

    async fn backfill(&self) -> Result<(), String> {
        let history = self
            .feed
            .fetch_history()
            .await
            .map_err(|e| format!("Error fetching historical data: {e}"))?;

        if history.is_empty() {
            return Err("No historical data available".into());
        }

        let mut fresh = IndicatorEngine::new(self.indicator);
        let mut rejected = 0usize;
        for tick in history {
            if fresh.add_tick(tick).is_err() {
                rejected += 1;
            }
        }
        if fresh.is_empty() {
            return Err("Historical data contained no valid prices".into());
        }

        info!(loaded = fresh.len(), rejected, "📚 Indicator engine seeded from history");
        *self.engine.write().await = fresh;
        Ok(())
    }

    /// Spawn feed + ingest unless already running. `false` when the feed is
    /// exhausted and stays down until `restart_feed`.
    fn ensure_feed(&self, runtime: &mut Runtime) -> bool {
        if runtime.feed_running() {
            return true;
        }
        if self.feed.state().is_exhausted() {
            return false;
        }

        let (tx, rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);

        let feed = self.feed.clone();
        runtime.feed = Some(tokio::spawn(async move {
            let result = feed.run(tx).await;
            if let Err(e) = &result {
                error!(error = %e, "🔌 Price feed gave up");
            }
            result
        }));
        runtime.ingest = Some(tokio::spawn(ingest(rx, self.engine.clone(), self.ticks_seen.clone())));

        info!(feed = self.feed.name(), "📡 Live feed task spawned");
        true
    }

    async fn await_live_tick(&self) -> bool {
        let mut rx = self.ticks_seen.subscribe();
        let start = *rx.borrow_and_update();
        tokio::time::timeout(self.warmup_timeout, tick_after(&mut rx, start))
            .await
            .is_ok_and(|arrived| arrived)
    }
}

/// Resolves `true` once the counter moves past `start`, `false` if the
/// ingest side is gone.
async fn tick_after(rx: &mut watch::Receiver<u64>, start: u64) -> bool {
    rx.wait_for(|n| *n > start).await.is_ok()
}

/// Sole writer of the engine while the feed runs.
async fn ingest(
    mut rx: mpsc::Receiver<PriceTick>,
    engine: Arc<RwLock<IndicatorEngine>>,
    seen: Arc<watch::Sender<u64>>,
) {
    let mut rejected = 0u64;
    while let Some(tick) = rx.recv().await {
        let added = engine.write().await.add_tick(tick);
        match added {
            Ok(()) => {
                seen.send_modify(|n| *n += 1);
            }
            Err(e) => {
                rejected += 1;
                if rejected == 1 {
                    warn!(error = %e, "⚠️  Live tick rejected, cycles stay degraded until ticks are accepted");
                } else {
                    debug!(error = %e, rejected, "live tick rejected");
                }
            }
        }
    }
    debug!("ingest task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::engine::lifecycle::tests::ScriptedBroker;
    use crate::error::DataError;
    use crate::feed::mock::Trend;
    use crate::feed::{FeedStatus, MockFeed, MockPriceGenerator};
    use crate::models::TradeStatus;

    /// Feed with canned history and live prices; optionally ends exhausted.
    struct CannedFeed {
        history:   Result<Vec<f64>, String>,
        live:      Vec<f64>,
        exhaust:   bool,
        state:     watch::Sender<ConnectionState>,
        shutdown:  watch::Sender<bool>,
        runs:      AtomicU32,
        backfills: AtomicU32,
    }

    impl CannedFeed {
        fn new(history: Result<Vec<f64>, String>, live: Vec<f64>, exhaust: bool) -> Self {
            Self {
                history,
                live,
                exhaust,
                state: watch::channel(ConnectionState::disconnected()).0,
                shutdown: watch::channel(false).0,
                runs: AtomicU32::new(0),
                backfills: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceFeed for CannedFeed {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn fetch_history(&self) -> Result<Vec<PriceTick>, DataError> {
            self.backfills.fetch_add(1, Ordering::SeqCst);
            let prices = self.history.clone().map_err(DataError::Backfill)?;
            let start = Utc::now() - chrono::Duration::seconds(prices.len() as i64 + 60);
            Ok(prices
                .iter()
                .enumerate()
                .map(|(i, p)| PriceTick::new(*p, start + chrono::Duration::seconds(i as i64)).unwrap())
                .collect())
        }

        async fn run(&self, on_tick: mpsc::Sender<PriceTick>) -> Result<(), FeedError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.exhaust {
                self.state.send_replace(ConnectionState { status: FeedStatus::Exhausted, reconnect_attempts: 5 });
                return Err(FeedError::Exhausted { attempts: 5 });
            }
            self.state.send_modify(|s| s.status = FeedStatus::Connected);
            for p in &self.live {
                if on_tick.send(PriceTick::now(*p).unwrap()).await.is_err() {
                    return Ok(());
                }
            }
            let mut shutdown = self.shutdown.subscribe();
            let _ = shutdown.wait_for(|s| *s).await;
            self.state.send_modify(|s| s.status = FeedStatus::Disconnected);
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
            self.state.send_replace(ConnectionState { status: FeedStatus::Connecting, reconnect_attempts: 0 });
        }
    }

    fn generator(feed: Arc<dyn PriceFeed>, warmup: Duration) -> SignalGenerator {
        let trades = Arc::new(TradeBook::new(
            Arc::new(ScriptedBroker::ok()),
            "EMB/USD",
            100.0,
            Duration::from_secs(1),
        ));
        SignalGenerator::new(feed, IndicatorConfig::new(2, 4).unwrap(), trades, warmup)
    }

    #[tokio::test]
    async fn backfill_failure_is_an_error_result() {
        let feed = Arc::new(CannedFeed::new(Err("HTTP 503".into()), vec![], false));
        let gen = generator(feed.clone(), Duration::from_millis(50));

        match gen.generate_cycle().await {
            CycleResult::Error { message, .. } => assert!(message.contains("HTTP 503")),
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(feed.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_backfill_is_an_error_result() {
        let gen = generator(Arc::new(CannedFeed::new(Ok(vec![]), vec![], false)), Duration::from_millis(50));
        assert_eq!(gen.generate_cycle().await.kind(), "error");
    }

    #[tokio::test]
    async fn rising_prices_prompt_a_buy() {
        let feed = Arc::new(CannedFeed::new(Ok(vec![1.0, 1.0, 1.0, 1.0, 1.1]), vec![1.2], false));
        let gen = generator(feed.clone(), Duration::from_secs(2));

        match gen.generate_cycle().await {
            CycleResult::TradePrompt { trade, confidence, live } => {
                assert!(live);
                assert_eq!(trade.entry_price, 1.2);
                assert_eq!(trade.status, TradeStatus::Pending);
                assert!((0.5..=0.95).contains(&confidence));
                assert!(gen.trades().get(trade.id).await.is_some());
            }
            other => panic!("expected trade_prompt, got {other:?}"),
        }
        gen.stop().await;
    }

    #[tokio::test]
    async fn short_history_is_no_trade() {
        let feed = Arc::new(CannedFeed::new(Ok(vec![1.0]), vec![], false));
        let gen = generator(feed, Duration::from_millis(20));

        match gen.generate_cycle().await {
            CycleResult::NoTrade { message, live, .. } => {
                assert_eq!(message, "Insufficient data for prediction");
                assert!(!live);
            }
            other => panic!("expected no_trade, got {other:?}"),
        }
        gen.stop().await;
    }

    #[tokio::test]
    async fn exhausted_feed_degrades_to_history() {
        let feed = Arc::new(CannedFeed::new(Ok(vec![1.0, 1.0, 1.0, 1.0, 1.1, 1.2]), vec![], true));
        let gen = generator(feed.clone(), Duration::from_millis(100));

        let first = gen.generate_cycle().await;
        assert!(matches!(first, CycleResult::TradePrompt { live: false, .. }));
        assert!(gen.feed_state().is_exhausted());

        // No respawn while exhausted, and no second backfill.
        let _ = gen.generate_cycle().await;
        assert_eq!(feed.runs.load(Ordering::SeqCst), 1);
        assert_eq!(feed.backfills.load(Ordering::SeqCst), 1);

        let state = gen.restart_feed().await;
        assert_eq!(state.status, FeedStatus::Connecting);
        let _ = gen.generate_cycle().await;
        assert_eq!(feed.backfills.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stopped_generator_refuses_cycles() {
        let feed = Arc::new(CannedFeed::new(Ok(vec![1.0; 5]), vec![], false));
        let gen = generator(feed, Duration::from_millis(20));
        let _ = gen.generate_cycle().await;
        gen.stop().await;
        assert_eq!(gen.generate_cycle().await.kind(), "error");
    }

    #[tokio::test]
    async fn mock_feed_cycle_reports_live_ticks() {
        let generator_feed = MockPriceGenerator::new(42, 0.075, 0.02).with_trend(Trend::Bullish, 1.0);
        let feed = Arc::new(MockFeed::new(generator_feed, 250, Duration::from_millis(5)));
        let trades = Arc::new(TradeBook::new(Arc::new(ScriptedBroker::ok()), "EMB/USD", 100.0, Duration::from_secs(1)));
        let gen = SignalGenerator::new(feed, IndicatorConfig::default(), trades, Duration::from_secs(2));

        let result = gen.generate_cycle().await;
        assert_ne!(result.kind(), "error");
        assert!(gen.live_ticks() >= 1);
        assert!(gen.history_len().await >= 250);
        gen.stop().await;
    }
}
