//! # routes::trades
//!
//! Proposal queries and the accept / skip decision.
//!
//! | Method | Path                    | Description                        |
//! |--------|-------------------------|------------------------------------|
//! | GET    | `/api/trades`           | All proposals, oldest first        |
//! | GET    | `/api/trades/:id`       | One proposal                       |
//! | POST   | `/api/trades/decision`  | `{ "id": "…", "decision": "accept" \| "skip" }` |

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::TradeDecision;
use crate::state::SharedState;

// ─── GET /api/trades ──────────────────────────────────────────────────────────

pub async fn list_trades(State(state): State<SharedState>) -> impl IntoResponse {
    let trades = state.trades.list().await;
    Json(json!({
        "ok":     true,
        "count":  trades.len(),
        "trades": trades,
    }))
}

// ─── GET /api/trades/:id ──────────────────────────────────────────────────────

pub async fn get_trade(
    State(state): State<SharedState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let trade = state
        .trades
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("trade {id} not found")))?;

    Ok(Json(json!({
        "ok":    true,
        "trade": trade,
    })))
}

// ─── POST /api/trades/decision ────────────────────────────────────────────────

/// Resolve a pending proposal.
///
/// * `200` with the updated proposal (`executed`, `failed` or `skipped`)
/// * `404` unknown id, `409` already resolved, `400` malformed body
pub async fn decide_trade(
    State(state): State<SharedState>,
    payload: Result<Json<TradeDecision>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(decision) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let trade = state.decide(&decision).await?;

    Ok(Json(json!({
        "ok":    true,
        "trade": trade,
    })))
}
