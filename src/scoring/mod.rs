//! Confidence scoring: how likely a player is to clear a stat threshold in an
//! upcoming game, expressed as a 0–100 decimal.
//!
//! Every scorer is a pure function over a history snapshot fetched once per
//! call by [`ConfidenceEngine`]; nothing here holds mutable state.

pub mod advanced;
pub mod baselines;
pub mod blowout;
pub mod composer;
pub mod context;
pub mod engine;
pub mod hit_rate;
pub mod recency;
pub mod rest;
pub mod window;

pub use advanced::AdvancedWeighting;
pub use baselines::LeagueBaselines;
pub use blowout::BlowoutImpact;
pub use composer::{ConfidenceBreakdown, ScoringStrategy};
pub use context::HomeCourtFactors;
pub use engine::{ConfidenceEngine, EngineSettings};
pub use hit_rate::HitRateSummary;
pub use window::{StatWindow, WindowPolicy};

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Neutral value used by most scorers when history is missing.
pub const NEUTRAL_SCORE: Decimal = dec!(50.00);

/// A scorer output, tagged with whether it came from data or from the
/// scorer's documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Factor {
    Measured(Decimal),
    Defaulted(Decimal),
}

impl Factor {
    pub fn value(self) -> Decimal {
        match self {
            Factor::Measured(v) | Factor::Defaulted(v) => v,
        }
    }

    pub fn is_defaulted(self) -> bool {
        matches!(self, Factor::Defaulted(_))
    }
}

/// Round half-up (away from zero) and pin the scale, so `20` becomes `20.0000`
/// at scale 4.
pub(crate) fn round_half_up(value: Decimal, scale: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    rounded
}

pub(crate) fn clamp_score(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Lossy f64 → Decimal; non-finite input maps to zero.
pub(crate) fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Mean of `values`, or `None` when empty.
pub(crate) fn mean(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    let mut sum = Decimal::ZERO;
    let mut n = 0i64;
    for v in values {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / Decimal::from(n))
}
