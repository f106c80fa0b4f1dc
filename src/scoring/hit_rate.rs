use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{mean, round_half_up};
use crate::db::models::{GameStatLine, Stat};
use crate::error::{CoreError, Result};

pub const MIN_THRESHOLD: u32 = 1;
pub const MAX_THRESHOLD: u32 = 51;

/// Share of the hit rate surfaced as the legacy integer confidence.
const PROXY_FACTOR: Decimal = dec!(0.8);

pub fn validate_threshold(threshold: u32) -> Result<()> {
    if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
        return Err(CoreError::invalid(format!(
            "threshold {} outside [{}, {}]",
            threshold, MIN_THRESHOLD, MAX_THRESHOLD
        )));
    }
    Ok(())
}

/// Hit rate and average over one window of games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRateSummary {
    /// Percentage of games at or above the threshold, scale 1.
    pub hit_rate: Decimal,
    /// Mean stat value over the window, scale 4.
    pub average: Decimal,
    /// `round(hit_rate × 0.8)`, kept for legacy dashboard consumers. Not the
    /// confidence score.
    pub confidence_proxy: u32,
    pub games: usize,
    pub hits: usize,
    pub sufficient_data: bool,
}

/// Summarize a window that has already been limited to the period.
/// An empty window yields zeros rather than an error.
pub fn summarize(
    window: &[GameStatLine],
    stat: Stat,
    threshold: u32,
    sufficient_data: bool,
) -> HitRateSummary {
    let hits = count_hits(window, stat, threshold);
    let hit_rate = if window.is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from(hits * 100) / Decimal::from(window.len())
    };
    let hit_rate = round_half_up(hit_rate, 1);
    let average = round_half_up(raw_average(window, stat).unwrap_or(Decimal::ZERO), 4);
    let confidence_proxy = (hit_rate * PROXY_FACTOR)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0);

    HitRateSummary {
        hit_rate,
        average,
        confidence_proxy,
        games: window.len(),
        hits,
        sufficient_data,
    }
}

pub fn count_hits(window: &[GameStatLine], stat: Stat, threshold: u32) -> usize {
    window
        .iter()
        .filter(|g| g.value(stat) >= threshold as i32)
        .count()
}

/// Unrounded mean of the stat over the window.
pub fn raw_average(window: &[GameStatLine], stat: Stat) -> Option<Decimal> {
    mean(window.iter().map(|g| Decimal::from(g.value(stat))))
}
