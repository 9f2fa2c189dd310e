//! # routes::monitor
//!
//! Health, broker account and the live event stream for dashboards.
//!
//! | Method    | Path            | Description                              |
//! |-----------|-----------------|------------------------------------------|
//! | GET (WS)  | `/ws/signals`   | Snapshot, then every `WsEvent` JSON      |
//! | GET       | `/api/health`   | Uptime, feed and broker summary          |
//! | GET       | `/api/account`  | Broker account snapshot                  |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::SharedState;

// ─── WebSocket ────────────────────────────────────────────────────────────────

/// `ws://host/ws/signals` — one JSON text frame per event.
pub async fn ws_signals(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 Signal stream client connected");

    // ── Snapshot on connect ───────────────────────────────────────────────────
    let snapshot = json!({
        "event":          "SNAPSHOT",
        "feed":           state.generator.feed_name(),
        "feed_state":     state.generator.feed_state(),
        "live_ticks":     state.generator.live_ticks(),
        "trades":         state.trades.list().await,
    })
    .to_string();

    if sender.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    // ── Event loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!("signal stream client lagged, skipped {n} events");
                    }
                    Err(_) => break,
                }
            }

            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("🔌 Signal stream client disconnected");
}

// ─── GET /api/health ──────────────────────────────────────────────────────────

pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "ok":             true,
        "uptime_secs":    state.started_at.elapsed().as_secs(),
        "feed":           state.generator.feed_name(),
        "feed_state":     state.generator.feed_state(),
        "broker":         state.broker.name(),
        "pending_trades": state.trades.pending_count().await,
    }))
}

// ─── GET /api/account ─────────────────────────────────────────────────────────

pub async fn get_account(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let account = state.broker.get_account().await?;
    Ok(Json(json!({
        "ok":      true,
        "broker":  state.broker.name(),
        "account": account,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::{router, tests::{get, send}};
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn health_reports_components() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = send(router(test_state(dir.path())), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["broker"], "mock");
        assert_eq!(json["pending_trades"], 0);
    }

    #[tokio::test]
    async fn mock_account_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = send(router(test_state(dir.path())), get("/api/account")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["account"]["balance"], 10_000.0);
        assert_eq!(json["account"]["currency"], "USD");
        assert_eq!(json["account"]["positions"][0]["quantity"], 1_000.0);
    }
}
