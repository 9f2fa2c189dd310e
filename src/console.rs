//! # console — line-oriented confirmation surface
//!
//! Enabled with `CONSOLE_DECISIONS=true`. Logs move to stderr so stdout
//! carries nothing but JSON lines:
//!
//! ```text
//! stdout ◀ {"type":"trade_prompt","trade":{"id":"…",…},"confidence":0.81,"live":true}
//! stdin  ▶ {"id":"…","decision":"accept"}
//! stdout ◀ {"type":"trade_result","result":{…,"status":"executed"}}
//! stdin  ▶ {"id":"…","decision":"skip"}
//! stdout ◀ {"type":"trade_skipped","trade_id":"…"}
//! ```

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{TradeDecision, TradeProposal, TradeStatus};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleReply {
    TradeResult { result: Box<TradeProposal> },
    TradeSkipped { trade_id: Uuid },
    Error { message: String },
}

impl ConsoleReply {
    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"serialization failed"}"#.to_string())
    }
}

/// Serve stdin / stdout until stdin closes.
pub async fn run(state: SharedState) {
    let mut stdout = tokio::io::stdout();
    serve(state, BufReader::new(tokio::io::stdin()), &mut stdout).await;
}

pub async fn serve<R, W>(state: SharedState, reader: R, writer: &mut W)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = state.broadcast_tx.subscribe();
    let mut lines = reader.lines();

    info!("⌨️  Console decisions enabled — reading {{id, decision}} lines from stdin");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(json) => {
                    if let Some(line) = cycle_line(&json) {
                        if write_line(writer, &line).await.is_err() {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("console lagged, {n} events dropped"),
                Err(RecvError::Closed) => break,
            },

            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let reply = handle_line(&state, &line).await;
                    if write_line(writer, &reply.to_json()).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("stdin closed — console decisions stopped");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            },
        }
    }
}

/// Apply one `{id, decision}` line.
pub async fn handle_line(state: &SharedState, line: &str) -> ConsoleReply {
    let decision: TradeDecision = match serde_json::from_str(line) {
        Ok(d) => d,
        Err(e) => return ConsoleReply::Error { message: format!("invalid decision: {e}") },
    };

    match state.decide(&decision).await {
        Ok(trade) if trade.status == TradeStatus::Skipped => ConsoleReply::TradeSkipped { trade_id: trade.id },
        Ok(trade) => ConsoleReply::TradeResult { result: Box::new(trade) },
        Err(e) => ConsoleReply::Error { message: e.to_string() },
    }
}

/// The bare cycle result out of a `CYCLE_COMPLETED` broadcast.
fn cycle_line(event_json: &str) -> Option<String> {
    let mut event: Value = serde_json::from_str(event_json).ok()?;
    if event.get("event")?.as_str()? != "CYCLE_COMPLETED" {
        return None;
    }
    Some(event.get_mut("result")?.take().to_string())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::lifecycle::tests::buy_recommendation;
    use crate::models::CycleResult;
    use crate::events::WsEvent;
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn accept_and_skip_lines_get_typed_replies() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let a = state.trades.propose(&buy_recommendation()).await.unwrap();
        let b = state.trades.propose(&buy_recommendation()).await.unwrap();

        let input = format!(
            "{{\"id\":\"{}\",\"decision\":\"accept\"}}\n\n{{\"id\":\"{}\",\"decision\":\"skip\"}}\nnot json\n",
            a.id, b.id
        );
        let mut out = Vec::new();
        serve(state.clone(), input.as_bytes(), &mut out).await;

        let replies: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["type"], "trade_result");
        assert_eq!(replies[0]["result"]["status"], "executed");
        assert_eq!(replies[1]["type"], "trade_skipped");
        assert_eq!(replies[1]["trade_id"], b.id.to_string());
        assert_eq!(replies[2]["type"], "error");
    }

    #[tokio::test]
    async fn second_decision_is_an_error_reply() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let a = state.trades.propose(&buy_recommendation()).await.unwrap();
        let line = format!(r#"{{"id":"{}","decision":"skip"}}"#, a.id);

        assert!(matches!(handle_line(&state, &line).await, ConsoleReply::TradeSkipped { .. }));
        assert!(matches!(handle_line(&state, &line).await, ConsoleReply::Error { .. }));
    }

    #[test]
    fn only_cycle_events_are_printed() {
        let cycle = WsEvent::CycleCompleted { result: Box::new(CycleResult::error("x")) }.to_json();
        let printed: Value = serde_json::from_str(&cycle_line(&cycle).unwrap()).unwrap();
        assert_eq!(printed["type"], "error");

        let other = r#"{"event":"FEED_RESTARTED","state":{}}"#;
        assert!(cycle_line(other).is_none());
    }
}
