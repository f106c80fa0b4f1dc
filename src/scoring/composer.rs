//! Final confidence composition.
//!
//! Two strategies read the same inputs and are not expected to agree:
//!
//! - **DashboardRefresh** (automated refresh): hit-rate base 55%, game context
//!   25%, recent form 20%, then the rest multiplier.
//! - **SinglePick** (on-demand scoring): recency 35%, advanced impact 30%,
//!   game context 35%, then the blowout discount when risk exceeds 60.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::blowout::apply_blowout_discount;
use super::context::GameContext;
use super::hit_rate::{count_hits, raw_average};
use super::rest::RestImpact;
use super::{clamp_score, mean, round_half_up, Factor, NEUTRAL_SCORE};
use crate::db::models::{GameStatLine, Stat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringStrategy {
    DashboardRefresh,
    SinglePick,
}

impl ScoringStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringStrategy::DashboardRefresh => "dashboard_refresh",
            ScoringStrategy::SinglePick => "single_pick",
        }
    }
}

const MAX_MARGIN_MULTIPLIER: Decimal = dec!(1.5);
const MARGIN_WEIGHT: Decimal = dec!(0.5);
/// threshold / average above this draws the 10% penalty.
const STRETCH_RATIO: Decimal = dec!(1.2);
const STRETCH_PENALTY: Decimal = dec!(0.9);
const FORM_GAMES: usize = 5;

/// Everything a strategy needs, gathered once by the engine.
#[derive(Debug, Clone)]
pub struct ScoringInputs<'a> {
    pub stat: Stat,
    pub threshold: u32,
    /// Games before the scored game, newest-first.
    pub prior_games: &'a [GameStatLine],
    /// `prior_games` limited to the base window.
    pub base_window: &'a [GameStatLine],
    pub context: GameContext,
    pub rest: RestImpact,
    pub recency: Factor,
    pub advanced: Factor,
    pub blowout_risk: Decimal,
    pub performance_retention: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub name: &'static str,
    pub value: Decimal,
    pub weight: Decimal,
    pub defaulted: bool,
}

impl Component {
    fn new(name: &'static str, factor: Factor, weight: Decimal) -> Self {
        Component {
            name,
            value: factor.value(),
            weight,
            defaulted: factor.is_defaulted(),
        }
    }

    fn weighted(&self) -> Decimal {
        self.value * self.weight
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfidenceBreakdown {
    pub strategy: ScoringStrategy,
    /// Final confidence in [0, 100], scale 2.
    pub score: Decimal,
    pub components: Vec<Component>,
    /// Multiplier actually applied (1 for strategies that ignore rest).
    pub rest_multiplier: Decimal,
    pub blowout_risk: Decimal,
    pub blowout_discount_applied: bool,
}

pub fn compose(strategy: ScoringStrategy, inputs: &ScoringInputs) -> ConfidenceBreakdown {
    match strategy {
        ScoringStrategy::DashboardRefresh => dashboard_refresh(inputs),
        ScoringStrategy::SinglePick => single_pick(inputs),
    }
}

fn dashboard_refresh(inputs: &ScoringInputs) -> ConfidenceBreakdown {
    let components = vec![
        Component::new(
            "base",
            base_score(inputs.base_window, inputs.stat, inputs.threshold),
            dec!(0.55),
        ),
        Component::new("matchup", Factor::Measured(inputs.context.score), dec!(0.25)),
        Component::new("recent_form", recent_form_score(inputs.prior_games, inputs.stat), dec!(0.20)),
    ];
    let composed = clamp_score(components.iter().map(Component::weighted).sum());
    let multiplier = inputs.rest.multiplier.value();
    let score = round_half_up(clamp_score(composed * multiplier), 2);

    ConfidenceBreakdown {
        strategy: ScoringStrategy::DashboardRefresh,
        score,
        components,
        rest_multiplier: multiplier,
        blowout_risk: inputs.blowout_risk,
        blowout_discount_applied: false,
    }
}

fn single_pick(inputs: &ScoringInputs) -> ConfidenceBreakdown {
    let components = vec![
        Component::new("recent_performance", inputs.recency, dec!(0.35)),
        Component::new("advanced_impact", inputs.advanced, dec!(0.30)),
        Component::new("game_context", Factor::Measured(inputs.context.score), dec!(0.35)),
    ];
    let composed = round_half_up(clamp_score(components.iter().map(Component::weighted).sum()), 2);
    let (score, applied) =
        apply_blowout_discount(composed, inputs.blowout_risk, inputs.performance_retention);

    ConfidenceBreakdown {
        strategy: ScoringStrategy::SinglePick,
        score,
        components,
        rest_multiplier: Decimal::ONE,
        blowout_risk: inputs.blowout_risk,
        blowout_discount_applied: applied,
    }
}

/// `min(1.5, 1 + (mean margin above threshold on hits / threshold) × 0.5)`;
/// 1 when there are no hits.
pub fn margin_multiplier(window: &[GameStatLine], stat: Stat, threshold: u32) -> Decimal {
    let t = Decimal::from(threshold);
    let margins = window
        .iter()
        .map(|g| g.value(stat))
        .filter(|v| *v >= threshold as i32)
        .map(|v| Decimal::from(v) - t);
    match mean(margins) {
        Some(avg) => (Decimal::ONE + avg / t * MARGIN_WEIGHT).min(MAX_MARGIN_MULTIPLIER),
        None => Decimal::ONE,
    }
}

/// Hit-rate score scaled by the margin multiplier, with a 10% penalty when the
/// threshold sits more than 20% above the player's average. Scale 2.
pub fn base_score(window: &[GameStatLine], stat: Stat, threshold: u32) -> Factor {
    if window.is_empty() {
        return Factor::Defaulted(round_half_up(Decimal::ZERO, 2));
    }
    let hit_rate = Decimal::from(count_hits(window, stat, threshold) * 100) / Decimal::from(window.len());
    let mut score = hit_rate * margin_multiplier(window, stat, threshold);

    let stretched = match raw_average(window, stat) {
        Some(avg) if avg > Decimal::ZERO => Decimal::from(threshold) / avg > STRETCH_RATIO,
        _ => true,
    };
    if stretched {
        score *= STRETCH_PENALTY;
    }
    Factor::Measured(round_half_up(clamp_score(score), 2))
}

/// 50 ± 3/5/8 depending on how far the last five games drift from the
/// season average (beyond 5%/10%/15%).
pub fn recent_form_score(prior_games: &[GameStatLine], stat: Stat) -> Factor {
    let season = raw_average(prior_games, stat);
    let recent = raw_average(&prior_games[..FORM_GAMES.min(prior_games.len())], stat);
    let (Some(recent), Some(season)) = (recent, season) else {
        return Factor::Defaulted(NEUTRAL_SCORE);
    };
    if season <= Decimal::ZERO {
        return Factor::Defaulted(NEUTRAL_SCORE);
    }

    let deviation = (recent - season) / season;
    let step = match deviation.abs() {
        d if d > dec!(0.15) => dec!(8),
        d if d > dec!(0.10) => dec!(5),
        d if d > dec!(0.05) => dec!(3),
        _ => Decimal::ZERO,
    };
    let adjustment = if deviation.is_sign_negative() { -step } else { step };
    Factor::Measured(round_half_up(NEUTRAL_SCORE + adjustment, 2))
}
