//! # routes::feed
//!
//! | Method | Path                 | Description                                  |
//! |--------|----------------------|----------------------------------------------|
//! | GET    | `/api/feed/status`   | Connection state + ticks seen                |
//! | POST   | `/api/feed/restart`  | Leave `exhausted`; next cycle reconnects     |

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::events::WsEvent;
use crate::state::SharedState;

// ─── GET /api/feed/status ─────────────────────────────────────────────────────

pub async fn feed_status(State(state): State<SharedState>) -> impl IntoResponse {
    let generator = &state.generator;
    Json(json!({
        "ok":          true,
        "feed":        generator.feed_name(),
        "state":       generator.feed_state(),
        "live_ticks":  generator.live_ticks(),
        "history_len": generator.history_len().await,
        "last_price":  generator.last_price().await,
    }))
}

// ─── POST /api/feed/restart ───────────────────────────────────────────────────

pub async fn restart_feed(State(state): State<SharedState>) -> impl IntoResponse {
    let feed_state = state.generator.restart_feed().await;
    state.broadcast(&WsEvent::FeedRestarted { state: feed_state });
    Json(json!({
        "ok":    true,
        "state": feed_state,
    }))
}
