//! Domain models shared across the signal service.

pub mod cycle;
pub mod proposal;
pub mod recommendation;
pub mod tick;

pub use cycle::CycleResult;
pub use proposal::{Side, TradeDecision, TradeProposal, TradeStatus};
pub use recommendation::{Action, Recommendation};
pub use tick::PriceTick;
