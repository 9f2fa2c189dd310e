//! # models::proposal
//!
//! Structs for trades that wait on a human decision.
//!
//! ## Lifecycle
//! ```text
//! Pending ──accept──▶ Accepted ──broker ok──▶ Executed
//!    │                    └──────broker err──▶ Failed (reason kept)
//!    └────skip──────▶ Skipped
//! ```
//! Only `Pending` can move; every other status is final.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Action, Recommendation};

// ─── Side ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// `None` for `hold`: there is nothing to trade.
    pub fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::Buy  => Some(Side::Buy),
            Action::Sell => Some(Side::Sell),
            Action::Hold => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy  => "buy",
            Side::Sell => "sell",
        }
    }
}

// ─── TradeStatus ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    /// Waiting for accept / skip.
    Pending,
    /// Accepted, order in flight to the broker.
    Accepted,
    Skipped,
    /// Broker acknowledged the order.
    Executed,
    /// Broker refused or was unreachable. See `failure_reason`.
    Failed,
}

impl TradeStatus {
    #[inline]
    pub fn is_pending(&self) -> bool {
        *self == TradeStatus::Pending
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeStatus::Pending  => "pending",
            TradeStatus::Accepted => "accepted",
            TradeStatus::Skipped  => "skipped",
            TradeStatus::Executed => "executed",
            TradeStatus::Failed   => "failed",
        };
        f.write_str(s)
    }
}

// ─── TradeProposal ────────────────────────────────────────────────────────────

/// A buy/sell recommendation turned into a concrete order awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub id:          Uuid,
    pub side:        Side,
    pub asset:       String,
    pub entry_price: f64,
    pub take_profit: f64,
    pub quantity:    f64,
    pub confidence:  f64,
    pub reasoning:   String,
    pub timestamp:   DateTime<Utc>,
    pub status:      TradeStatus,
    /// Broker error text when `status == Failed`.
    pub failure_reason: Option<String>,
    /// Broker order id when `status == Executed`.
    pub order_id:    Option<String>,
    pub decided_at:  Option<DateTime<Utc>>,
}

impl TradeProposal {
    /// Returns `None` for a `hold` recommendation or one without prices.
    pub fn from_recommendation(
        rec: &Recommendation,
        asset: &str,
        quantity: f64,
    ) -> Option<Self> {
        let side = Side::from_action(rec.action)?;
        Some(Self {
            id:             Uuid::new_v4(),
            side,
            asset:          asset.to_string(),
            entry_price:    rec.entry_price?,
            take_profit:    rec.take_profit?,
            quantity,
            confidence:     rec.confidence,
            reasoning:      rec.reasoning.clone(),
            timestamp:      rec.timestamp,
            status:         TradeStatus::Pending,
            failure_reason: None,
            order_id:       None,
            decided_at:     None,
        })
    }
}

// ─── Decision ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Skip,
}

/// The `{id, decision}` payload read back from a confirmation surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub id:       Uuid,
    pub decision: Decision,
}

impl TradeDecision {
    #[inline]
    pub fn accepted(&self) -> bool {
        self.decision == Decision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_never_becomes_a_proposal() {
        let rec = Recommendation::insufficient_data();
        assert!(TradeProposal::from_recommendation(&rec, "EMB/USD", 100.0).is_none());
    }

    #[test]
    fn decision_payload_uses_lowercase_words() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"id":"{id}","decision":"skip"}}"#);
        let parsed: TradeDecision = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.decision, Decision::Skip);
        assert!(!parsed.accepted());
    }
}
