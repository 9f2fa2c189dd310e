//! Alpaca-style REST adapter.
//!
//! ```text
//! POST {base}/orders     {"symbol","qty","side","type":"market","time_in_force":"gtc"}
//! GET  {base}/account    cash / buying_power / multiplier / trading_blocked …
//! GET  {base}/positions  [{"symbol","qty","avg_entry_price"}]
//! ```
//! Alpaca encodes money as decimal strings; they are parsed to `f64` here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::broker::{AccountSnapshot, Broker, OrderAck, OrderRequest, OrderType, Position, TimeInForce};
use crate::error::BrokerError;

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

pub struct AlpacaBroker {
    client:     reqwest::Client,
    base_url:   String,
    api_key:    String,
    api_secret: String,
}

impl AlpacaBroker {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(KEY_HEADER, &self.api_key)
            .header(SECRET_HEADER, &self.api_secret)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, BrokerError> {
        let resp = self
            .authed(self.client.get(format!("{}{path}", self.base_url)))
            .send()
            .await
            .map_err(|e| BrokerError::Http(e.to_string()))?;

        checked(resp)
            .await?
            .json()
            .await
            .map_err(|e| BrokerError::Decode(e.to_string()))
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AlpacaOrderBody<'a> {
    symbol:        &'a str,
    qty:           String,
    side:          &'static str,
    #[serde(rename = "type")]
    order_type:    OrderType,
    time_in_force: TimeInForce,
}

#[derive(Debug, Deserialize)]
struct AlpacaOrder {
    id:           String,
    status:       String,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AlpacaAccount {
    cash:            String,
    currency:        String,
    buying_power:    String,
    #[serde(default)]
    multiplier:      Option<String>,
    #[serde(default)]
    trading_blocked: bool,
    #[serde(default)]
    account_blocked: bool,
}

#[derive(Debug, Deserialize)]
struct AlpacaPosition {
    symbol:          String,
    qty:             String,
    avg_entry_price: String,
}

fn decimal(field: &str, raw: &str) -> Result<f64, BrokerError> {
    raw.trim()
        .parse()
        .map_err(|_| BrokerError::Decode(format!("{field} is not a number: {raw:?}")))
}

fn to_snapshot(account: AlpacaAccount, positions: Vec<AlpacaPosition>) -> Result<AccountSnapshot, BrokerError> {
    let multiplier = match account.multiplier.as_deref() {
        Some(m) => decimal("multiplier", m)?,
        None => 1.0,
    };
    let positions = positions
        .into_iter()
        .map(|p| {
            Ok(Position {
                quantity:        decimal("qty", &p.qty)?,
                avg_entry_price: decimal("avg_entry_price", &p.avg_entry_price)?,
                symbol:          p.symbol,
            })
        })
        .collect::<Result<Vec<_>, BrokerError>>()?;

    Ok(AccountSnapshot {
        balance:         decimal("cash", &account.cash)?,
        currency:        account.currency,
        positions,
        trading_enabled: !(account.trading_blocked || account.account_blocked),
        margin_ratio:    if multiplier > 0.0 { 1.0 / multiplier } else { 1.0 },
        buying_power:    decimal("buying_power", &account.buying_power)?,
    })
}

/// Non-2xx → `Rejected` carrying the response body.
async fn checked(resp: Response) -> Result<Response, BrokerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    error!(%status, body, "Alpaca rejected the request");
    Err(BrokerError::Rejected(format!("{status}: {body}")))
}

// ─── Broker impl ──────────────────────────────────────────────────────────────

#[async_trait]
impl Broker for AlpacaBroker {
    fn name(&self) -> &'static str {
        "alpaca"
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerError> {
        let body = AlpacaOrderBody {
            symbol:        &order.symbol,
            qty:           order.quantity.to_string(),
            side:          order.side.as_str(),
            order_type:    order.order_type,
            time_in_force: order.time_in_force,
        };

        info!(symbol = %order.symbol, side = body.side, qty = %body.qty, "🚀 [ALPACA] Submitting order");

        let resp = self
            .authed(self.client.post(format!("{}/orders", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::Http(e.to_string()))?;

        let placed: AlpacaOrder = checked(resp)
            .await?
            .json()
            .await
            .map_err(|e| BrokerError::Decode(e.to_string()))?;

        info!(order_id = %placed.id, status = %placed.status, "✅ Alpaca order accepted");

        Ok(OrderAck {
            order_id:     placed.id,
            status:       placed.status,
            submitted_at: placed.submitted_at.unwrap_or_else(Utc::now),
        })
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        let account: AlpacaAccount = self.get_json("/account").await?;
        let positions: Vec<AlpacaPosition> = self.get_json("/positions").await?;
        to_snapshot(account, positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    #[test]
    fn order_body_uses_alpaca_field_names() {
        let order = OrderRequest::market("EMB/USD", 100.0, Side::Sell);
        let body = AlpacaOrderBody {
            symbol:        &order.symbol,
            qty:           order.quantity.to_string(),
            side:          order.side.as_str(),
            order_type:    order.order_type,
            time_in_force: order.time_in_force,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "symbol": "EMB/USD",
                "qty": "100",
                "side": "sell",
                "type": "market",
                "time_in_force": "gtc"
            })
        );
    }

    #[test]
    fn account_strings_are_parsed() {
        let account: AlpacaAccount = serde_json::from_str(
            r#"{"cash":"10000.50","currency":"USD","buying_power":"20001","multiplier":"2","trading_blocked":false}"#,
        )
        .unwrap();
        let positions: Vec<AlpacaPosition> = serde_json::from_str(
            r#"[{"symbol":"EMBUSD","qty":"1000","avg_entry_price":"0.075"}]"#,
        )
        .unwrap();

        let snap = to_snapshot(account, positions).unwrap();
        assert_eq!(snap.balance, 10_000.5);
        assert_eq!(snap.buying_power, 20_001.0);
        assert_eq!(snap.margin_ratio, 0.5);
        assert!(snap.trading_enabled);
        assert_eq!(snap.positions[0].quantity, 1000.0);
    }

    #[test]
    fn garbage_decimal_is_a_decode_error() {
        let account: AlpacaAccount =
            serde_json::from_str(r#"{"cash":"lots","currency":"USD","buying_power":"1"}"#).unwrap();
        assert!(matches!(to_snapshot(account, vec![]), Err(BrokerError::Decode(_))));
    }

    #[test]
    fn trailing_slash_in_base_url_is_dropped() {
        let broker = AlpacaBroker::new(reqwest::Client::new(), "https://paper-api.alpaca.markets/v2/", "k", "s");
        assert_eq!(broker.base_url, "https://paper-api.alpaca.markets/v2");
    }
}
