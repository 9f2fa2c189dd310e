//! # error
//!
//! Error taxonomy for the signal service.
//!
//! | Type            | Raised by                    | Fate                                   |
//! |-----------------|------------------------------|----------------------------------------|
//! | `ConfigError`   | `Config`, `IndicatorConfig`  | fatal at startup                       |
//! | `TransportError`| feed transport               | recovered inside the feed client       |
//! | `FeedError`     | `PriceFeed::run`             | ends live ingestion, cycle degrades    |
//! | `DataError`     | backfill, tick validation    | cycle-level `error` result             |
//! | `DecisionError` | `TradeBook`                  | returned to the caller of `decide`     |
//! | `BrokerError`   | broker adapters              | stored on the proposal as `failed`     |
//! | `AppError`      | HTTP handlers                | JSON error body                        |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid indicator windows: short={short} long={long} (need 0 < short < long)")]
    InvalidWindows { short: usize, long: usize },

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// A failure of the underlying price stream connection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("stream closed by peer")]
    Closed,
}

#[derive(Debug, Error, PartialEq)]
pub enum FeedError {
    /// Reconnection budget used up. Terminal until `restart()`.
    #[error("reconnection exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("tick at {got} is older than the last recorded tick at {last}")]
    OutOfOrder {
        last: chrono::DateTime<chrono::Utc>,
        got:  chrono::DateTime<chrono::Utc>,
    },

    #[error("historical backfill failed: {0}")]
    Backfill(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("trade {0} not found")]
    NotFound(Uuid),

    #[error("trade {id} already resolved ({status})")]
    AlreadyResolved { id: Uuid, status: String },

    /// A `hold` recommendation cannot become a proposal.
    #[error("recommendation is not actionable")]
    NotActionable,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error("broker unreachable: {0}")]
    Http(String),

    #[error("broker rejected order: {0}")]
    Rejected(String),

    #[error("broker response could not be decoded: {0}")]
    Decode(String),

    #[error("broker call timed out after {0} ms")]
    Timeout(u64),
}

// ─── HTTP mapping ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The proposal was decided before this request arrived.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<DecisionError> for AppError {
    fn from(err: DecisionError) -> Self {
        match err {
            DecisionError::NotFound(_) => AppError::NotFound(err.to_string()),
            DecisionError::AlreadyResolved { .. } => AppError::Conflict(err.to_string()),
            DecisionError::NotActionable => AppError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Broker(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_errors_map_to_http_statuses() {
        let id = Uuid::new_v4();
        let not_found: AppError = DecisionError::NotFound(id).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let resolved: AppError = DecisionError::AlreadyResolved {
            id,
            status: "skipped".into(),
        }
        .into();
        assert_eq!(resolved.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn broker_errors_are_bad_gateway() {
        let err: AppError = BrokerError::Timeout(5000).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
