//! Advanced-metrics impact: how the player's latest PIE / usage / efficiency
//! line supports the requested category.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{clamp_score, round_half_up, to_decimal, Factor, LeagueBaselines, NEUTRAL_SCORE};
use crate::db::models::{AdvancedStatLine, Stat};

/// Two weighting schemes for the same responsibility; callers pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvancedWeighting {
    /// Sub-scores normalized against league baselines, weighted per category.
    NormalizedBaseline,
    /// Raw ratings weighted 0.40/0.30/0.30 without normalization.
    RawRatings,
}

/// PIE / usage / efficiency weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryWeights {
    pub pie: Decimal,
    pub usage: Decimal,
    pub efficiency: Decimal,
}

impl CategoryWeights {
    pub fn for_stat(stat: Stat) -> Self {
        match stat {
            Stat::Points => CategoryWeights {
                pie: dec!(0.20),
                usage: dec!(0.30),
                efficiency: dec!(0.50),
            },
            Stat::Assists | Stat::Rebounds => CategoryWeights {
                pie: dec!(0.10),
                usage: dec!(0.20),
                efficiency: dec!(0.70),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSubScores {
    pub pie: Decimal,
    pub usage: Decimal,
    pub efficiency: Decimal,
}

impl ImpactSubScores {
    pub const NEUTRAL: ImpactSubScores = ImpactSubScores {
        pie: NEUTRAL_SCORE,
        usage: NEUTRAL_SCORE,
        efficiency: NEUTRAL_SCORE,
    };
}

pub fn sub_scores(line: &AdvancedStatLine, stat: Stat, baselines: &LeagueBaselines) -> ImpactSubScores {
    let pie = clamp_score((to_decimal(line.pie) - baselines.pie) * Decimal::ONE_HUNDRED + NEUTRAL_SCORE);
    let usage = clamp_score(to_decimal(line.usage_pct) / baselines.usage_pct * Decimal::ONE_HUNDRED);
    let (metric, baseline) = match stat {
        Stat::Points => (line.true_shooting_pct, baselines.true_shooting_pct),
        Stat::Assists => (line.assist_pct, baselines.assist_pct),
        Stat::Rebounds => (line.rebound_pct, baselines.rebound_pct),
    };
    let efficiency = clamp_score(to_decimal(metric) / baseline * Decimal::ONE_HUNDRED);
    ImpactSubScores {
        pie,
        usage,
        efficiency,
    }
}

/// Impact in [0, 100], scale 2, from the most recent advanced line only.
/// Missing data yields the neutral 50.00.
pub fn advanced_impact(
    latest: Option<&AdvancedStatLine>,
    stat: Stat,
    weighting: AdvancedWeighting,
    baselines: &LeagueBaselines,
) -> Factor {
    let Some(line) = latest else {
        return Factor::Defaulted(weighted(ImpactSubScores::NEUTRAL, stat));
    };

    let raw = match weighting {
        AdvancedWeighting::NormalizedBaseline => weighted(sub_scores(line, stat, baselines), stat),
        AdvancedWeighting::RawRatings => raw_rating_score(line, stat),
    };
    Factor::Measured(raw)
}

fn weighted(scores: ImpactSubScores, stat: Stat) -> Decimal {
    let w = CategoryWeights::for_stat(stat);
    let total = scores.pie * w.pie + scores.usage * w.usage + scores.efficiency * w.efficiency;
    round_half_up(clamp_score(total), 2)
}

fn raw_rating_score(line: &AdvancedStatLine, stat: Stat) -> Decimal {
    let d = to_decimal;
    let total = match stat {
        Stat::Points => {
            d(line.true_shooting_pct) * dec!(0.40)
                + d(line.usage_pct) * dec!(0.30)
                + d(line.pie) * Decimal::ONE_HUNDRED * dec!(0.30)
        }
        Stat::Assists => {
            d(line.assist_pct) * dec!(0.40)
                + d(line.assist_ratio) * dec!(0.30)
                + d(line.usage_pct) * dec!(0.30)
        }
        Stat::Rebounds => {
            d(line.rebound_pct) * dec!(0.40)
                + d(line.defensive_rebound_pct) * dec!(0.30)
                + d(line.offensive_rebound_pct) * dec!(0.30)
        }
    };
    round_half_up(clamp_score(total), 2)
}
