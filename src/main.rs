//! # EmbassyTrade — MA-crossover signal service
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐  ws subscribe   ┌───────────────────────────────────────────┐
//!  │ Price stream │ ──────────────▶ │ SignalGenerator                           │
//!  │ (or mock)    │   ticks         │  ├─ IndicatorEngine (50 / 200 MA)         │
//!  └──────────────┘                 │  └─ TradeBook ── accept ──▶ Broker        │
//!                                   └───────────────────────────────────────────┘
//!      every SIGNAL_INTERVAL_SECS ──▶ run_cycle ──▶ trades/{date}/cycle_*.txt
//!                                          │
//!                                          ├──▶ ws://host/ws/signals
//!                                          └──▶ stdout (CONSOLE_DECISIONS=true)
//!
//!  POST /api/trades/decision  {id, decision}   ──▶ TradeBook::decide
//! ```
//!
//! ## Environment Variables
//!
//! | Variable              | Default        | Description                          |
//! |-----------------------|----------------|--------------------------------------|
//! | `BIND_ADDR`           | `0.0.0.0:3000` | Address Axum listens on              |
//! | `FEED_MODE`           | `mock`         | `mock` or `live` (needs `FEED_WS_URL`) |
//! | `BROKER_MODE`         | `mock`         | `mock` or `alpaca` (needs `ALPACA_*`) |
//! | `SIGNAL_INTERVAL_SECS`| `10`           | Background cycle period              |
//! | `CONSOLE_DECISIONS`   | `false`        | JSON-lines accept / skip on stdio    |
//! | `RUST_LOG`            | `embassy_signals=debug` | Tracing filter              |
//!
//! The full list lives in [`config`].

use std::time::Duration;

use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

mod broker;
mod config;
mod console;
mod engine;
mod error;
mod events;
mod feed;
mod models;
mod result_log;
mod routes;
mod state;

use config::Config;
use state::{build_state, SharedState};

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional — CI/prod can use real env vars) ──────────────
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // ── 2. Structured logging (stderr when stdout carries console JSON) ──────
    let writer = if config.console_decisions {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(
            EnvFilter::from_default_env()
                .add_directive("embassy_signals=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║          EMBASSYTRADE — Signal Service                ║
  ║  Feed · Indicators · Signals · Confirmation · Broker  ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Shared state ───────────────────────────────────────────────────────
    let state = build_state(&config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── 4. Background loops ───────────────────────────────────────────────────
    let cycle_task = tokio::spawn(signal_loop(state.clone(), config.signal.interval, shutdown_rx));
    if config.console_decisions {
        tokio::spawn(console::run(state.clone()));
    }

    // ── 5. Router ─────────────────────────────────────────────────────────────
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // ── 6. Bind & Serve ───────────────────────────────────────────────────────
    info!(addr = ?config.bind_addr, "🚀 EmbassyTrade server starting");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 7. Drain ──────────────────────────────────────────────────────────────
    shutdown_tx.send_replace(true);
    let _ = cycle_task.await;
    state.generator.stop().await;
    info!("👋 Shutdown complete");

    Ok(())
}

// ─── Signal loop ──────────────────────────────────────────────────────────────

/// One cycle per `period` until shutdown. A slow cycle delays the next tick
/// instead of stacking cycles.
async fn signal_loop(state: SharedState, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(period_secs = period.as_secs(), "🔁 Signal loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = state.run_cycle().await;
                info!(kind = result.kind(), "cycle complete");
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    info!("🛑 Ctrl-C received — shutting down");
}
