//! # feed::client
//!
//! **Price Feed Client**: the reconnecting receive loop.
//!
//! ```text
//!  disconnected ──run──▶ connecting ──ok──▶ connected ──frames──▶ on_tick
//!                          ▲   │                 │
//!                          │   └─err─┐    err / peer close
//!                          │         ▼           │
//!                          └──backoff◀── attempts += 1 ◀┘
//!                                    │
//!                        attempts == max ──▶ exhausted (until restart)
//! ```
//!
//! The transport sits behind [`Connector`] / [`FrameStream`] so the state
//! machine is exercised in tests without a socket.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::{DataError, FeedError, TransportError};
use crate::feed::frame::{parse_price, subscribe_message};
use crate::feed::{Backoff, ConnectionState, FeedStatus, HistorySource, PriceFeed, WsConnector};
use crate::models::PriceTick;

// ─── Transport seam ───────────────────────────────────────────────────────────

/// An open subscription yielding raw text frames.
#[async_trait]
pub trait FrameStream: Send {
    /// `None` once the peer has closed the stream.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the underlying connection.
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Open the transport and send `subscribe` once.
    async fn connect(&self, subscribe: &str) -> Result<Box<dyn FrameStream>, TransportError>;
}

// ─── Client ───────────────────────────────────────────────────────────────────

enum PumpExit {
    /// `stop()` was called.
    Stopped,
    /// Nobody is reading ticks any more.
    ConsumerGone,
    Lost(TransportError),
}

pub struct FeedClient<C> {
    connector:    C,
    subscribe:    String,
    max_attempts: u32,
    backoff:      Backoff,
    state:        watch::Sender<ConnectionState>,
    shutdown:     watch::Sender<bool>,
}

impl<C: Connector> FeedClient<C> {
    pub fn new(connector: C, asset_address: &str, max_attempts: u32, backoff: Backoff) -> Self {
        let (state, _) = watch::channel(ConnectionState::disconnected());
        let (shutdown, _) = watch::channel(false);
        Self {
            connector,
            subscribe: subscribe_message(asset_address),
            max_attempts: max_attempts.max(1),
            backoff,
            state,
            shutdown,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe every state transition.
    #[cfg(test)]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn restart(&self) {
        self.shutdown.send_replace(false);
        self.state.send_replace(ConnectionState {
            status:             FeedStatus::Connecting,
            reconnect_attempts: 0,
        });
        info!("🔄 Feed restarted: reconnect budget reset");
    }

    fn set_status(&self, status: FeedStatus) {
        self.state.send_modify(|s| s.status = status);
    }

    /// One subscription: open the transport and send the subscribe message.
    async fn connect(&self) -> Result<Box<dyn FrameStream>, TransportError> {
        self.connector.connect(&self.subscribe).await
    }

    /// Receive loop. See the module diagram for the transitions.
    pub async fn run(&self, on_tick: mpsc::Sender<PriceTick>) -> Result<(), FeedError> {
        let current = self.state();
        if current.is_exhausted() {
            return Err(FeedError::Exhausted { attempts: current.reconnect_attempts });
        }

        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            self.set_status(FeedStatus::Disconnected);
            return Ok(());
        }

        loop {
            self.set_status(FeedStatus::Connecting);

            let connected = tokio::select! {
                res = self.connect() => Some(res),
                _ = stopped(&mut shutdown) => None,
            };

            let lost = match connected {
                None => {
                    self.set_status(FeedStatus::Disconnected);
                    return Ok(());
                }
                Some(Ok(mut stream)) => {
                    self.state.send_replace(ConnectionState {
                        status:             FeedStatus::Connected,
                        reconnect_attempts: 0,
                    });
                    info!("📡 Price stream connected");

                    match self.pump(stream.as_mut(), &on_tick, &mut shutdown).await {
                        PumpExit::Stopped | PumpExit::ConsumerGone => {
                            stream.close().await;
                            self.set_status(FeedStatus::Disconnected);
                            info!("📴 Price stream closed");
                            return Ok(());
                        }
                        PumpExit::Lost(err) => err,
                    }
                }
                Some(Err(err)) => err,
            };

            let mut attempts = 0;
            self.state.send_modify(|s| {
                s.reconnect_attempts += 1;
                s.status = FeedStatus::Connecting;
                attempts = s.reconnect_attempts;
            });

            if attempts >= self.max_attempts {
                self.set_status(FeedStatus::Exhausted);
                error!(attempts, error = %lost, "❌ Max reconnection attempts reached");
                return Err(FeedError::Exhausted { attempts });
            }

            let delay = self.backoff.delay(attempts);
            warn!(
                error    = %lost,
                attempt  = attempts,
                max      = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Price stream lost, reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut shutdown) => {
                    self.set_status(FeedStatus::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn pump(
        &self,
        stream: &mut dyn FrameStream,
        on_tick: &mpsc::Sender<PriceTick>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PumpExit {
        loop {
            let frame = tokio::select! {
                frame = stream.next_frame() => frame,
                _ = stopped(shutdown) => return PumpExit::Stopped,
            };

            let text = match frame {
                Some(Ok(text)) => text,
                Some(Err(err)) => return PumpExit::Lost(err),
                None => return PumpExit::Lost(TransportError::Closed),
            };

            let parsed = match parse_price(&text) {
                Ok(parsed) => parsed,
                Err(skip) => {
                    debug!(?skip, len = text.len(), "frame dropped");
                    continue;
                }
            };

            let tick = match PriceTick::now(parsed.price) {
                Ok(tick) => tick,
                Err(err) => {
                    warn!(error = %err, "tick rejected");
                    continue;
                }
            };

            debug!(price = tick.value, volume = ?parsed.volume, "tick received");
            if on_tick.send(tick).await.is_err() {
                return PumpExit::ConsumerGone;
            }
        }
    }
}

/// Resolves once `stop()` has been called.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

// ─── Live feed ────────────────────────────────────────────────────────────────

/// Streaming client plus its backfill source.
pub struct LiveFeed<C = WsConnector> {
    client:  FeedClient<C>,
    history: HistorySource,
}

impl<C: Connector> LiveFeed<C> {
    pub fn new(client: FeedClient<C>, history: HistorySource) -> Self {
        Self { client, history }
    }
}

#[async_trait]
impl<C: Connector + 'static> PriceFeed for LiveFeed<C> {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn fetch_history(&self) -> Result<Vec<PriceTick>, DataError> {
        self.history.fetch().await
    }

    async fn run(&self, on_tick: mpsc::Sender<PriceTick>) -> Result<(), FeedError> {
        self.client.run(on_tick).await
    }

    fn state(&self) -> ConnectionState {
        self.client.state()
    }

    fn stop(&self) {
        self.client.stop();
    }

    fn restart(&self) {
        self.client.restart();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    type Frames = Vec<Result<String, TransportError>>;

    /// Connector that replays a fixed list of connection outcomes.
    pub(crate) struct ScriptedConnector {
        script:    Mutex<VecDeque<Result<Frames, TransportError>>>,
        hold_open: bool,
        pub connects: Arc<AtomicU32>,
        pub closed:   Arc<AtomicBool>,
        pub subscribed_with: Mutex<Option<String>>,
    }

    impl ScriptedConnector {
        pub(crate) fn new(script: Vec<Result<Frames, TransportError>>, hold_open: bool) -> Self {
            Self {
                script: Mutex::new(script.into()),
                hold_open,
                connects: Arc::new(AtomicU32::new(0)),
                closed:   Arc::new(AtomicBool::new(false)),
                subscribed_with: Mutex::new(None),
            }
        }
    }

    struct ScriptedStream {
        frames:    VecDeque<Result<String, TransportError>>,
        hold_open: bool,
        closed:    Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameStream for ScriptedStream {
        async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
            match self.frames.pop_front() {
                Some(frame) => Some(frame),
                None if self.hold_open => std::future::pending().await,
                None => None,
            }
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, subscribe: &str) -> Result<Box<dyn FrameStream>, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            *self.subscribed_with.lock().unwrap() = Some(subscribe.to_string());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Connect("script exhausted".into())));
            let frames = next?;
            Ok(Box::new(ScriptedStream {
                frames:    frames.into(),
                hold_open: self.hold_open,
                closed:    self.closed.clone(),
            }))
        }
    }

    fn client(connector: ScriptedConnector, max: u32) -> FeedClient<ScriptedConnector> {
        FeedClient::new(connector, "ASSET", max, Backoff::Fixed(Duration::from_millis(1)))
    }

    fn refused() -> Result<Frames, TransportError> {
        Err(TransportError::Connect("refused".into()))
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts_and_stays_exhausted() {
        let feed = client(ScriptedConnector::new(vec![], false), 3);
        let connects = feed.connector.connects.clone();
        let (tx, _rx) = mpsc::channel(8);

        assert_eq!(feed.run(tx.clone()).await, Err(FeedError::Exhausted { attempts: 3 }));
        assert_eq!(connects.load(Ordering::SeqCst), 3);
        assert_eq!(
            feed.state(),
            ConnectionState { status: FeedStatus::Exhausted, reconnect_attempts: 3 }
        );

        // terminal: no further connects without restart
        assert!(feed.run(tx).await.is_err());
        assert_eq!(connects.load(Ordering::SeqCst), 3);

        feed.restart();
        assert_eq!(
            feed.state(),
            ConnectionState { status: FeedStatus::Connecting, reconnect_attempts: 0 }
        );
    }

    #[tokio::test]
    async fn successful_connect_resets_the_attempt_counter() {
        let dropped = || Ok(vec![Err(TransportError::Receive("reset by peer".into()))]);
        let script = vec![dropped(), refused(), dropped(), refused(), refused()];
        let feed = client(ScriptedConnector::new(script, false), 3);
        let connects = feed.connector.connects.clone();
        let (tx, _rx) = mpsc::channel(8);

        assert_eq!(feed.run(tx).await, Err(FeedError::Exhausted { attempts: 3 }));
        // without the reset it would have given up on the third connect
        assert_eq!(connects.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped_without_disconnecting() {
        let frames = vec![
            Ok("garbage".to_string()),
            Ok(r#"{"jsonrpc":"2.0","result":77,"id":1}"#.to_string()),
            Ok(r#"{"result":{"price":"abc"}}"#.to_string()),
            Ok(r#"{"result":{"price":-1}}"#.to_string()),
            Ok(r#"{"result":{"price":1.5}}"#.to_string()),
            Ok(r#"{"result":{"value":{"data":{"price":"2.5","volume":"10"}}}}"#.to_string()),
        ];
        let feed = Arc::new(client(ScriptedConnector::new(vec![Ok(frames)], true), 3));
        let connects = feed.connector.connects.clone();
        let closed = feed.connector.closed.clone();
        let (tx, mut rx) = mpsc::channel(8);

        let runner = tokio::spawn({
            let feed = feed.clone();
            async move { feed.run(tx).await }
        });

        assert_eq!(rx.recv().await.map(|t| t.value), Some(1.5));
        assert_eq!(rx.recv().await.map(|t| t.value), Some(2.5));
        assert_eq!(feed.state().status, FeedStatus::Connected);

        feed.stop();
        let outcome = tokio::time::timeout(Duration::from_secs(1), runner).await;
        assert_eq!(outcome.unwrap().unwrap(), Ok(()));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(feed.state().status, FeedStatus::Disconnected);
    }

    #[tokio::test]
    async fn subscribe_message_is_sent_on_connect() {
        let feed = Arc::new(client(ScriptedConnector::new(vec![Ok(vec![])], true), 3));
        let (tx, _rx) = mpsc::channel(8);
        let mut states = feed.subscribe_state();

        let runner = tokio::spawn({
            let feed = feed.clone();
            async move { feed.run(tx).await }
        });
        states.wait_for(|s| s.status == FeedStatus::Connected).await.unwrap();

        let sent = feed.connector.subscribed_with.lock().unwrap().clone().unwrap();
        assert!(sent.contains("subscribeProgram"));
        assert!(sent.contains("ASSET"));

        feed.stop();
        assert_eq!(runner.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn stop_interrupts_the_backoff_wait() {
        let feed = Arc::new(FeedClient::new(
            ScriptedConnector::new(vec![], false),
            "ASSET",
            5,
            Backoff::Fixed(Duration::from_secs(3600)),
        ));
        let (tx, _rx) = mpsc::channel(8);
        let mut states = feed.subscribe_state();

        let runner = tokio::spawn({
            let feed = feed.clone();
            async move { feed.run(tx).await }
        });
        states.wait_for(|s| s.reconnect_attempts == 1).await.unwrap();

        feed.stop();
        let outcome = tokio::time::timeout(Duration::from_secs(1), runner).await;
        assert_eq!(outcome.unwrap().unwrap(), Ok(()));
        assert_eq!(feed.state().status, FeedStatus::Disconnected);
    }

    #[tokio::test]
    async fn dropped_consumer_ends_the_loop() {
        let frames = vec![Ok(r#"{"result":{"price":1.0}}"#.to_string())];
        let feed = client(ScriptedConnector::new(vec![Ok(frames)], true), 3);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        assert_eq!(feed.run(tx).await, Ok(()));
        assert_eq!(feed.state().status, FeedStatus::Disconnected);
    }
}
