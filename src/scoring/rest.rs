//! Days-of-rest multiplier.
//!
//! The multiplier compares the player's own average after the same rest
//! length with their overall average. Thin samples fall back to a fixed
//! table. It scales the composed confidence; it is never added to it.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{mean, round_half_up, Factor};
use crate::db::models::{Game, GameStatLine, Stat};

/// Rest assumed when the player has no earlier game.
pub const DEFAULT_REST_DAYS: i64 = 1;
/// Rest lengths at or beyond this share one bucket.
const REST_BUCKET_CAP: i64 = 4;
const MIN_REST_SAMPLES: usize = 3;
const MIN_MULTIPLIER: Decimal = dec!(0.90);
const MAX_MULTIPLIER: Decimal = dec!(1.10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestImpact {
    pub days_of_rest: i64,
    pub multiplier: Factor,
    pub back_to_back: bool,
}

/// Calendar days since the player's previous game; `None` when there is none.
pub fn days_of_rest(prior_games: &[GameStatLine], game_date: NaiveDate) -> Option<i64> {
    prior_games
        .iter()
        .find(|g| g.game_date < game_date)
        .map(|g| (game_date - g.game_date).num_days())
}

pub fn fallback_multiplier(days: i64) -> Decimal {
    match days.min(REST_BUCKET_CAP) {
        i64::MIN..=1 => dec!(1.00),
        2 => dec!(1.02),
        _ => dec!(1.03),
    }
}

/// `prior_games` is newest-first and holds only games before `game_date`.
pub fn rest_multiplier(prior_games: &[GameStatLine], game_date: NaiveDate, stat: Stat) -> (i64, Factor) {
    let Some(days) = days_of_rest(prior_games, game_date) else {
        return (DEFAULT_REST_DAYS, Factor::Defaulted(dec!(1.00)));
    };
    let bucket = days.min(REST_BUCKET_CAP);

    let after_same_rest: Vec<Decimal> = prior_games
        .windows(2)
        .filter(|pair| (pair[0].game_date - pair[1].game_date).num_days().min(REST_BUCKET_CAP) == bucket)
        .map(|pair| Decimal::from(pair[0].value(stat)))
        .collect();
    let baseline = mean(prior_games.iter().map(|g| Decimal::from(g.value(stat))));

    match (after_same_rest.len() >= MIN_REST_SAMPLES, baseline) {
        (true, Some(base)) if base > Decimal::ZERO => {
            let rested = mean(after_same_rest).unwrap_or(base);
            let ratio = (rested / base).clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);
            (days, Factor::Measured(round_half_up(ratio, 2)))
        }
        _ => (days, Factor::Defaulted(fallback_multiplier(days))),
    }
}

/// True when the team has a final game exactly one day before `game`.
pub fn is_back_to_back(team_games: &[Game], game: &Game) -> bool {
    let previous_day = game.game_date - Duration::days(1);
    team_games
        .iter()
        .any(|g| g.id != game.id && g.is_final() && g.game_date == previous_day)
}
