//! # broker — order hand-off boundary
//!
//! Accepted proposals leave the service through a [`Broker`]. Two adapters:
//!
//! | Adapter         | `BROKER_MODE` | Behaviour                                   |
//! |-----------------|---------------|---------------------------------------------|
//! | [`MockBroker`]  | `mock`        | acknowledges everything, fixed paper account |
//! | [`AlpacaBroker`]| `alpaca`      | `POST /orders`, `GET /account` over HTTPS   |
//!
//! Orders are always market / good-till-cancelled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::models::{Side, TradeProposal};

pub mod alpaca;
pub mod mock;

pub use alpaca::AlpacaBroker;
pub use mock::MockBroker;

// ─── Order ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Gtc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol:        String,
    pub quantity:      f64,
    pub side:          Side,
    pub order_type:    OrderType,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, quantity: f64, side: Side) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side,
            order_type:    OrderType::Market,
            time_in_force: TimeInForce::Gtc,
        }
    }

    pub fn for_proposal(proposal: &TradeProposal) -> Self {
        Self::market(proposal.asset.clone(), proposal.quantity, proposal.side)
    }
}

/// What the broker hands back for an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAck {
    pub order_id:     String,
    pub status:       String,
    pub submitted_at: DateTime<Utc>,
}

// ─── Account ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol:          String,
    pub quantity:        f64,
    pub avg_entry_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSnapshot {
    pub balance:         f64,
    pub currency:        String,
    pub positions:       Vec<Position>,
    pub trading_enabled: bool,
    pub margin_ratio:    f64,
    pub buying_power:    f64,
}

// ─── Capability ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait Broker: Send + Sync {
    /// Adapter name for logs and `/api/health`.
    fn name(&self) -> &'static str;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerError>;

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError>;
}
