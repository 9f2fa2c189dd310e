//! # engine::lifecycle
//!
//! **Trade Lifecycle Manager** — the book of proposals waiting on a human.
//!
//! Every transition out of `pending` happens under the write lock, so a
//! proposal is decided exactly once even when two surfaces race on the same
//! id. The broker call for an accepted proposal runs *after* the lock is
//! released; the proposal sits in `accepted` meanwhile, which already counts
//! as resolved for any second caller.
//!
//! Settlement (broker call + final `executed` / `failed` write) runs on its
//! own task. A caller that goes away mid-flight, such as an HTTP client that
//! disconnects, never leaves a proposal stranded in `accepted`.
//!
//! Resolved proposals, and pending ones nobody answered, are dropped once
//! they are older than the retention window. Pruning runs on every `propose`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::broker::{Broker, OrderRequest};
use crate::error::{BrokerError, DecisionError};
use crate::models::{Recommendation, TradeProposal, TradeStatus};

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

type TradeMap = Arc<RwLock<HashMap<Uuid, TradeProposal>>>;

pub struct TradeBook {
    trades:         TradeMap,
    broker:         Arc<dyn Broker>,
    asset:          String,
    quantity:       f64,
    broker_timeout: Duration,
    retention:      Duration,
}

impl TradeBook {
    pub fn new(
        broker: Arc<dyn Broker>,
        asset: impl Into<String>,
        quantity: f64,
        broker_timeout: Duration,
    ) -> Self {
        Self {
            trades: Arc::new(RwLock::new(HashMap::new())),
            broker,
            asset: asset.into(),
            quantity,
            broker_timeout,
            retention: DEFAULT_RETENTION,
        }
    }

    /// How long a resolved or unanswered proposal stays queryable.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    /// Store a new `pending` proposal for a buy/sell recommendation.
    pub async fn propose(&self, rec: &Recommendation) -> Result<TradeProposal, DecisionError> {
        let proposal = TradeProposal::from_recommendation(rec, &self.asset, self.quantity)
            .ok_or(DecisionError::NotActionable)?;

        {
            let mut trades = self.trades.write().await;
            prune(&mut trades, self.retention, Utc::now());
            trades.insert(proposal.id, proposal.clone());
        }

        info!(
            trade_id = %proposal.id,
            side = proposal.side.as_str(),
            entry = proposal.entry_price,
            tp = proposal.take_profit,
            confidence = proposal.confidence,
            "📝 Trade proposed — awaiting confirmation"
        );
        Ok(proposal)
    }

    /// Resolve a pending proposal. `accept = true` hands it to the broker.
    ///
    /// A broker failure is not an error here: the proposal comes back
    /// `failed` with the reason attached.
    pub async fn decide(&self, id: Uuid, accept: bool) -> Result<TradeProposal, DecisionError> {
        // ── 1. One-shot transition under the lock ────────────────────────────
        let snapshot = {
            let mut trades = self.trades.write().await;
            let trade = trades.get_mut(&id).ok_or(DecisionError::NotFound(id))?;

            if !trade.status.is_pending() {
                return Err(DecisionError::AlreadyResolved {
                    id,
                    status: trade.status.to_string(),
                });
            }

            trade.status = if accept { TradeStatus::Accepted } else { TradeStatus::Skipped };
            trade.decided_at = Some(Utc::now());
            trade.clone()
        };

        if !accept {
            info!(trade_id = %id, "⏭️  Trade skipped");
            return Ok(snapshot);
        }

        // ── 2. Settle on a detached task, lock released ──────────────────────
        let settlement = tokio::spawn(settle(
            self.trades.clone(),
            self.broker.clone(),
            self.broker_timeout,
            snapshot,
        ));

        match settlement.await {
            Ok(settled) => settled,
            Err(e) => {
                // The broker leg panicked; the order's fate is unknown.
                error!(trade_id = %id, error = %e, "❌ Settlement task aborted");
                let mut trades = self.trades.write().await;
                let trade = trades.get_mut(&id).ok_or(DecisionError::NotFound(id))?;
                trade.status = TradeStatus::Failed;
                trade.failure_reason = Some(format!("settlement aborted: {e}"));
                Ok(trade.clone())
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<TradeProposal> {
        self.trades.read().await.get(&id).cloned()
    }

    /// All proposals, oldest first.
    pub async fn list(&self) -> Vec<TradeProposal> {
        let mut all: Vec<TradeProposal> = self.trades.read().await.values().cloned().collect();
        all.sort_by_key(|t| t.timestamp);
        all
    }

    pub async fn pending_count(&self) -> usize {
        self.trades
            .read()
            .await
            .values()
            .filter(|t| t.status.is_pending())
            .count()
    }
}

/// Broker call plus the final status write for an `accepted` proposal.
async fn settle(
    trades: TradeMap,
    broker: Arc<dyn Broker>,
    broker_timeout: Duration,
    snapshot: TradeProposal,
) -> Result<TradeProposal, DecisionError> {
    let id = snapshot.id;
    let order = OrderRequest::for_proposal(&snapshot);
    let outcome = match tokio::time::timeout(broker_timeout, broker.place_order(&order)).await {
        Ok(result) => result,
        Err(_) => Err(BrokerError::Timeout(broker_timeout.as_millis() as u64)),
    };

    let mut trades = trades.write().await;
    let trade = trades.get_mut(&id).ok_or(DecisionError::NotFound(id))?;
    match outcome {
        Ok(ack) => {
            info!(trade_id = %id, order_id = %ack.order_id, broker = broker.name(), "✅ Trade executed");
            trade.status = TradeStatus::Executed;
            trade.order_id = Some(ack.order_id);
        }
        Err(e) => {
            error!(trade_id = %id, error = %e, broker = broker.name(), "❌ Trade execution failed");
            trade.status = TradeStatus::Failed;
            trade.failure_reason = Some(e.to_string());
        }
    }
    Ok(trade.clone())
}

/// Drop proposals whose last activity is older than `retention`. In-flight
/// (`accepted`) proposals are always kept.
fn prune(trades: &mut HashMap<Uuid, TradeProposal>, retention: Duration, now: DateTime<Utc>) {
    let Ok(retention) = chrono::Duration::from_std(retention) else {
        return;
    };
    let before = trades.len();
    trades.retain(|_, t| {
        t.status == TradeStatus::Accepted || now - t.decided_at.unwrap_or(t.timestamp) < retention
    });
    let dropped = before - trades.len();
    if dropped > 0 {
        debug!(dropped, remaining = trades.len(), "🧹 Expired proposals pruned");
    }
}
