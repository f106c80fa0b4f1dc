//! Blowout risk: team-strength gap → probability of a lopsided game, and how
//! well a player holds up when one happens.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{clamp_score, mean, round_half_up, to_decimal, LeagueBaselines};
use crate::db::models::{AdvancedStatLine, Game, GameId, GameStatLine};

/// Risk above which single-pick scores are discounted.
pub const BLOWOUT_RISK_THRESHOLD: Decimal = dec!(60.00);
/// Final margin at which a game counts as a blowout.
pub const BLOWOUT_MARGIN: i32 = 20;
pub const STRENGTH_LOOKBACK_DAYS: i64 = 30;
/// Player games examined by the retention analysis.
pub const IMPACT_SAMPLE_GAMES: usize = 20;
const RETENTION_DISCOUNT: Decimal = dec!(0.3);
const MIN_SPLIT_SAMPLES: usize = 2;

// Logistic on |differential|: 50% risk at a 10-point gap, ~3.4% at parity.
const RISK_MIDPOINT: f64 = 10.0;
const RISK_SCALE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStrength {
    pub net_rating: Decimal,
    pub pace: Decimal,
    pub defaulted: bool,
}

/// Trailing averages; missing data falls back to the blowout rating default
/// (100.00) and baseline pace, not to the 110.00 defensive baseline.
pub fn team_strength(lines: &[AdvancedStatLine], baselines: &LeagueBaselines) -> TeamStrength {
    let net = mean(lines.iter().map(|l| to_decimal(l.net_rating)));
    let pace = mean(lines.iter().map(|l| to_decimal(l.pace)));
    TeamStrength {
        net_rating: net.unwrap_or(baselines.blowout_rating_default),
        pace: pace.unwrap_or(baselines.pace),
        defaulted: net.is_none(),
    }
}

/// Pace-adjusted net-rating gap between two sides, scale 2.
pub fn strength_differential(a: &TeamStrength, b: &TeamStrength, baselines: &LeagueBaselines) -> Decimal {
    let pace = (a.pace + b.pace) / Decimal::TWO;
    round_half_up((a.net_rating - b.net_rating) * pace / baselines.pace, 2)
}

/// Monotonic in |differential|, clamped to [0, 100], scale 2.
pub fn blowout_probability(differential: Decimal) -> Decimal {
    let gap = differential.abs().to_f64().unwrap_or(0.0);
    let p = 100.0 / (1.0 + (-(gap - RISK_MIDPOINT) / RISK_SCALE).exp());
    round_half_up(clamp_score(to_decimal(p)), 2)
}

/// Discount `base` by `1 − retention × 0.3` once risk exceeds 60.
/// Returns the (possibly unchanged) score and whether the discount applied.
pub fn apply_blowout_discount(base: Decimal, risk: Decimal, performance_retention: Decimal) -> (Decimal, bool) {
    if risk > BLOWOUT_RISK_THRESHOLD {
        let factor = Decimal::ONE - performance_retention * RETENTION_DISCOUNT;
        (round_half_up(base * factor, 2), true)
    } else {
        (base, false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlowoutImpact {
    pub minutes_retention: Decimal,
    pub performance_retention: Decimal,
    /// Share of the player's sampled games that were blowouts, 0–100.
    pub base_risk: Decimal,
    pub blowout_games: usize,
    pub sampled_games: usize,
}

impl BlowoutImpact {
    pub fn neutral() -> Self {
        BlowoutImpact {
            minutes_retention: round_half_up(Decimal::ONE, 2),
            performance_retention: round_half_up(Decimal::ONE, 2),
            base_risk: round_half_up(Decimal::ZERO, 2),
            blowout_games: 0,
            sampled_games: 0,
        }
    }
}

/// Compare the player's minutes and PIE/usage in blowouts against normal games.
/// Games without a known final margin are ignored.
pub fn blowout_impact(
    lines: &[GameStatLine],
    advanced: &[AdvancedStatLine],
    games: &HashMap<GameId, Game>,
) -> BlowoutImpact {
    let is_blowout = |id: GameId| {
        games
            .get(&id)
            .and_then(Game::margin)
            .map(|m| m >= BLOWOUT_MARGIN)
    };

    let (mut blowout_minutes, mut normal_minutes) = (Vec::new(), Vec::new());
    for line in lines {
        match is_blowout(line.game_id) {
            Some(true) => blowout_minutes.push(to_decimal(line.minutes)),
            Some(false) => normal_minutes.push(to_decimal(line.minutes)),
            None => {}
        }
    }

    let (mut blowout_adv, mut normal_adv) = (Vec::new(), Vec::new());
    for line in advanced {
        match is_blowout(line.game_id) {
            Some(true) => blowout_adv.push(line),
            Some(false) => normal_adv.push(line),
            None => {}
        }
    }

    let sampled = blowout_minutes.len() + normal_minutes.len();
    if sampled == 0 {
        return BlowoutImpact::neutral();
    }
    let blowouts = blowout_minutes.len();
    let base_risk = Decimal::from(blowouts * 100) / Decimal::from(sampled);

    let minutes_retention = split_ratio(&blowout_minutes, &normal_minutes).unwrap_or(Decimal::ONE);

    let ratios: Vec<Decimal> = [
        split_ratio(&metric(&blowout_adv, |l| l.usage_pct), &metric(&normal_adv, |l| l.usage_pct)),
        split_ratio(&metric(&blowout_adv, |l| l.pie), &metric(&normal_adv, |l| l.pie)),
    ]
    .into_iter()
    .flatten()
    .collect();
    let performance_retention = mean(ratios)
        .map(|r| r.clamp(Decimal::ZERO, Decimal::ONE))
        .unwrap_or(Decimal::ONE);

    BlowoutImpact {
        minutes_retention: round_half_up(minutes_retention, 2),
        performance_retention: round_half_up(performance_retention, 2),
        base_risk: round_half_up(base_risk, 2),
        blowout_games: blowouts,
        sampled_games: sampled,
    }
}

fn metric(rows: &[&AdvancedStatLine], f: fn(&AdvancedStatLine) -> f64) -> Vec<Decimal> {
    rows.iter().map(|l| to_decimal(f(l))).collect()
}

/// mean(blowout) / mean(normal) when both sides have enough samples and the
/// normal mean is positive.
fn split_ratio(blowout: &[Decimal], normal: &[Decimal]) -> Option<Decimal> {
    if blowout.len() < MIN_SPLIT_SAMPLES || normal.len() < MIN_SPLIT_SAMPLES {
        return None;
    }
    let normal_mean = mean(normal.iter().copied())?;
    if normal_mean <= Decimal::ZERO {
        return None;
    }
    Some(mean(blowout.iter().copied())? / normal_mean)
}
