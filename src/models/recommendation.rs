//! # models::recommendation
//!
//! What the indicator engine thinks should happen next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction suggested by the MA-crossover rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// Fresh recommendation produced on every `recommend()` call. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,

    /// Human-readable explanation, shown on the confirmation surface.
    pub reasoning: String,

    /// Latest price. `None` for `hold`.
    pub entry_price: Option<f64>,

    /// 5 % above (buy) or below (sell) the entry. `None` for `hold`.
    pub take_profit: Option<f64>,

    /// Always within `[0, 1]`; `0.0` when there is not enough history.
    pub confidence: f64,

    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

impl Recommendation {
    /// `hold` with zero confidence and no averages.
    pub fn insufficient_data() -> Self {
        Self {
            action:      Action::Hold,
            reasoning:   "Insufficient data for prediction".to_string(),
            entry_price: None,
            take_profit: None,
            confidence:  0.0,
            short_ma:    None,
            long_ma:     None,
            timestamp:   Utc::now(),
        }
    }

    #[inline]
    pub fn is_actionable(&self) -> bool {
        self.action != Action::Hold
    }
}
