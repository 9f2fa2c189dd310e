//! # models::cycle
//!
//! [`CycleResult`] — the single discriminated output of one signal cycle,
//! as consumed by the confirmation surfaces and the result log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TradeProposal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleResult {
    /// A buy/sell proposal is waiting for `{id, decision}`.
    TradePrompt {
        trade:      Box<TradeProposal>,
        confidence: f64,
        /// `false` when no live tick reached the engine this cycle.
        live:       bool,
    },

    NoTrade {
        message:   String,
        timestamp: DateTime<Utc>,
        live:      bool,
    },

    Error {
        message:   String,
        timestamp: DateTime<Utc>,
    },
}

impl CycleResult {
    pub fn error(message: impl Into<String>) -> Self {
        CycleResult::Error {
            message:   message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CycleResult::TradePrompt { .. } => "trade_prompt",
            CycleResult::NoTrade { .. }     => "no_trade",
            CycleResult::Error { .. }       => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_is_tagged_by_type() {
        let value = serde_json::to_value(CycleResult::error("boom")).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "boom");

        let no_trade = CycleResult::NoTrade {
            message:   "No clear trend detected".into(),
            timestamp: Utc::now(),
            live:      true,
        };
        assert_eq!(serde_json::to_value(&no_trade).unwrap()["type"], "no_trade");
        assert_eq!(no_trade.kind(), "no_trade");
    }
}
