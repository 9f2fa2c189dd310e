//! # routes
//!
//! | Method   | Path                    | Handler                          |
//! |----------|-------------------------|----------------------------------|
//! | GET      | `/api/health`           | [`monitor::health_check`]        |
//! | GET      | `/api/account`          | [`monitor::get_account`]         |
//! | GET (WS) | `/ws/signals`           | [`monitor::ws_signals`]          |
//! | POST     | `/api/signals/cycle`    | [`signals::run_cycle`]           |
//! | GET      | `/api/trades`           | [`trades::list_trades`]          |
//! | GET      | `/api/trades/:id`       | [`trades::get_trade`]            |
//! | POST     | `/api/trades/decision`  | [`trades::decide_trade`]         |
//! | GET      | `/api/feed/status`      | [`feed::feed_status`]            |
//! | POST     | `/api/feed/restart`     | [`feed::restart_feed`]           |

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::SharedState;

pub mod feed;
pub mod monitor;
pub mod signals;
pub mod trades;

/// All routes, state attached. Middleware is layered on in `main`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        // ── Monitor ───────────────────────────────────────────────────────────
        .route("/api/health",          get(monitor::health_check))
        .route("/api/account",         get(monitor::get_account))
        .route("/ws/signals",          get(monitor::ws_signals))
        // ── Signals ───────────────────────────────────────────────────────────
        .route("/api/signals/cycle",   post(signals::run_cycle))
        // ── Trades ────────────────────────────────────────────────────────────
        .route("/api/trades",          get(trades::list_trades))
        .route("/api/trades/decision", post(trades::decide_trade))
        .route("/api/trades/:id",      get(trades::get_trade))
        // ── Feed ──────────────────────────────────────────────────────────────
        .route("/api/feed/status",     get(feed::feed_status))
        .route("/api/feed/restart",    post(feed::restart_feed))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    /// Fire one request, return status and parsed JSON body.
    pub(crate) async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn post_json(uri: &str, json: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }
}
