//! # feed::frame
//!
//! Wire format of the price stream.
//!
//! Outbound, once per connection:
//! ```json
//! {"jsonrpc":"2.0","id":1,"method":"subscribeProgram","params":["<asset address>"]}
//! ```
//! Inbound, either shape carries a tick:
//! ```json
//! {"result":{"price":0.0751}}
//! {"result":{"value":{"data":{"price":"0.0751","volume":"1200"}}}}
//! ```
//! Everything else (subscription acks, heartbeats, garbage) is not a tick.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    jsonrpc: &'static str,
    id:      u64,
    method:  &'static str,
    params:  [&'a str; 1],
}

/// JSON text of the subscribe envelope for `asset_address`.
pub fn subscribe_message(asset_address: &str) -> String {
    let req = SubscribeRequest {
        jsonrpc: "2.0",
        id:      1,
        method:  "subscribeProgram",
        params:  [asset_address],
    };
    serde_json::to_string(&req).unwrap_or_default()
}

/// A price pulled out of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePrice {
    pub price:  f64,
    pub volume: Option<f64>,
}

/// Why a frame was not a tick. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSkip {
    InvalidJson,
    /// `result` missing or not an object (e.g. the numeric subscription ack).
    NoResult,
    NoPrice,
    NotNumeric,
    /// Zero, negative or non-finite.
    OutOfRange,
}

/// Extract a positive finite price from one text frame.
pub fn parse_price(text: &str) -> Result<FramePrice, FrameSkip> {
    let value: Value = serde_json::from_str(text).map_err(|_| FrameSkip::InvalidJson)?;

    let result = value
        .get("result")
        .filter(|r| r.is_object())
        .ok_or(FrameSkip::NoResult)?;

    // Flat shape first, then the nested account-notification shape.
    let (raw_price, raw_volume) = match result.get("price") {
        Some(p) => (p, result.get("volume")),
        None => {
            let data = result
                .pointer("/value/data")
                .ok_or(FrameSkip::NoPrice)?;
            (data.get("price").ok_or(FrameSkip::NoPrice)?, data.get("volume"))
        }
    };

    let price = as_number(raw_price).ok_or(FrameSkip::NotNumeric)?;
    if !price.is_finite() || price <= 0.0 {
        return Err(FrameSkip::OutOfRange);
    }

    Ok(FramePrice {
        price,
        volume: raw_volume.and_then(as_number),
    })
}

/// JSON numbers and numeric strings both count.
pub(crate) fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
