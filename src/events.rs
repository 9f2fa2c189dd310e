//! # events
//!
//! [`WsEvent`] — everything pushed to `/ws/signals` subscribers.
//!
//! Events travel through `tokio::sync::broadcast::Sender<String>` already
//! serialized, so the channel never needs `Clone` on the payload types.

use serde::Serialize;

use crate::feed::ConnectionState;
use crate::models::{CycleResult, TradeProposal};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WsEvent {
    /// A signal cycle finished (any outcome).
    CycleCompleted {
        result: Box<CycleResult>,
    },

    /// A proposal left `pending`: executed, failed or skipped.
    TradeResolved {
        trade: Box<TradeProposal>,
    },

    /// Feed was reset via `/api/feed/restart`.
    FeedRestarted {
        state: ConnectionState,
    },
}

impl WsEvent {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tag_is_screaming_snake() {
        let json = WsEvent::CycleCompleted {
            result: Box::new(CycleResult::error("x")),
        }
        .to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "CYCLE_COMPLETED");
        assert_eq!(value["result"]["type"], "error");
    }
}
