//! # engine
//!
//! * [`indicator`] — price series, moving averages, recommendation
//! * [`signal`]    — one signal cycle: backfill, live feed, recommend, propose
//! * [`lifecycle`] — proposals awaiting accept / skip, broker hand-off

pub mod indicator;
pub mod lifecycle;
pub mod signal;

pub use lifecycle::TradeBook;
pub use signal::SignalGenerator;
