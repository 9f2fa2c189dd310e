//! # routes::signals
//!
//! On-demand signal cycle. The background loop in `main` runs the same
//! [`AppState::run_cycle`](crate::state::AppState::run_cycle).

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::state::SharedState;

// ─── POST /api/signals/cycle ──────────────────────────────────────────────────

/// Run one cycle now and return its result.
///
/// ### Response
/// ```json
/// { "ok": true, "result": { "type": "trade_prompt", "trade": { … }, "confidence": 0.82, "live": true } }
/// ```
/// A failed cycle is still `200`: `result.type` is `"error"`.
pub async fn run_cycle(State(state): State<SharedState>) -> impl IntoResponse {
    let result = state.run_cycle().await;
    Json(json!({
        "ok":     true,
        "result": result,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::{router, tests::{post_json, send}};
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn cycle_endpoint_returns_a_typed_result() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let (status, body) = send(router(state.clone()), post_json("/api/signals/cycle", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        let kind = body["result"]["type"].as_str().unwrap();
        assert!(["trade_prompt", "no_trade"].contains(&kind));

        state.generator.stop().await;
    }
}
