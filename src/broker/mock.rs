//! Paper broker: no network, every order acknowledged.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::broker::{AccountSnapshot, Broker, OrderAck, OrderRequest, Position};
use crate::error::BrokerError;

const MOCK_BALANCE: f64 = 10_000.0;
const MOCK_POSITION_QTY: f64 = 1_000.0;
const MOCK_BUYING_POWER: f64 = 5_000.0;
const MOCK_MARGIN_RATIO: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct MockBroker {
    /// Symbol of the single position in the fake account.
    position_symbol: String,
    /// Its average entry price (the mock feed's base price).
    base_price:      f64,
}

impl MockBroker {
    pub fn new(position_symbol: impl Into<String>, base_price: f64) -> Self {
        Self {
            position_symbol: position_symbol.into(),
            base_price,
        }
    }
}

#[async_trait]
impl Broker for MockBroker {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerError> {
        let ack = OrderAck {
            order_id:     format!("mock-{}", Uuid::new_v4()),
            status:       "accepted".into(),
            submitted_at: Utc::now(),
        };
        info!(
            order_id = %ack.order_id,
            symbol = %order.symbol,
            side = order.side.as_str(),
            qty = order.quantity,
            "🧪 [MOCK] Order acknowledged (not sent)"
        );
        Ok(ack)
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        Ok(AccountSnapshot {
            balance:   MOCK_BALANCE,
            currency:  "USD".into(),
            positions: vec![Position {
                symbol:          self.position_symbol.clone(),
                quantity:        MOCK_POSITION_QTY,
                avg_entry_price: self.base_price,
            }],
            trading_enabled: true,
            margin_ratio:    MOCK_MARGIN_RATIO,
            buying_power:    MOCK_BUYING_POWER,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    #[tokio::test]
    async fn account_is_the_fixed_paper_snapshot() {
        let broker = MockBroker::new("EMB", 0.075);
        let account = broker.get_account().await.unwrap();
        assert_eq!(account.balance, 10_000.0);
        assert_eq!(account.buying_power, 5_000.0);
        assert_eq!(account.positions[0].symbol, "EMB");
        assert_eq!(account.positions[0].avg_entry_price, 0.075);
        assert!(account.trading_enabled);
    }

    #[tokio::test]
    async fn every_order_gets_a_fresh_id() {
        let broker = MockBroker::new("EMB", 0.075);
        let order = OrderRequest::market("EMB/USD", 100.0, Side::Buy);
        let a = broker.place_order(&order).await.unwrap();
        let b = broker.place_order(&order).await.unwrap();
        assert!(a.order_id.starts_with("mock-"));
        assert_ne!(a.order_id, b.order_id);
    }
}
