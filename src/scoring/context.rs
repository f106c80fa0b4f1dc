//! Game context: venue, opponent defense and the player's history against
//! this opponent, folded into one [0, 100] score.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::hit_rate::count_hits;
use super::{clamp_score, mean, round_half_up, to_decimal, Factor, LeagueBaselines, NEUTRAL_SCORE};
use crate::db::models::{AdvancedStatLine, GameStatLine, Stat};

/// Trailing window for the opponent's defensive rating.
pub const DEFENSE_LOOKBACK_DAYS: i64 = 30;
/// Meetings needed before the matchup hit rate is trusted.
pub const MATCHUP_MIN_MEETINGS: usize = 4;

/// Home/away multiplier pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeCourtFactors {
    pub home: Decimal,
    pub away: Decimal,
}

impl HomeCourtFactors {
    pub const STANDARD: HomeCourtFactors = HomeCourtFactors {
        home: dec!(1.03),
        away: dec!(0.97),
    };

    /// Venue impact normalized against a 1.00 home baseline.
    pub const VENUE_NORMALIZED: HomeCourtFactors = HomeCourtFactors {
        home: dec!(1.00),
        away: dec!(0.98),
    };

    pub fn factor(&self, is_home: bool) -> Decimal {
        if is_home {
            self.home
        } else {
            self.away
        }
    }
}

impl Default for HomeCourtFactors {
    fn default() -> Self {
        HomeCourtFactors::STANDARD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameContext {
    pub home_factor: Decimal,
    pub defense_factor: Factor,
    pub matchup: Factor,
    /// Combined score in [0, 100], scale 2.
    pub score: Decimal,
}

/// Opponent's average defensive rating relative to the league, scale 2.
///
/// Computed as `opponent / league`, the inverse of the `league / opponent`
/// ratio, so a stingier defense (lower rating) gives a factor below 1 and
/// suppresses the context score. `league / opponent` would reward facing a
/// strong defense. No recent data means a league-average opponent.
pub fn defense_factor(opponent_lines: &[AdvancedStatLine], baselines: &LeagueBaselines) -> Factor {
    match mean(opponent_lines.iter().map(|l| to_decimal(l.defensive_rating))) {
        Some(avg) => Factor::Measured(round_half_up(avg / baselines.defensive_rating, 2)),
        None => Factor::Defaulted(round_half_up(Decimal::ONE, 2)),
    }
}

/// Player's hit rate against this opponent, once there are enough meetings.
pub fn matchup_impact(meetings: &[GameStatLine], stat: Stat, threshold: u32) -> Factor {
    if meetings.len() < MATCHUP_MIN_MEETINGS {
        return Factor::Defaulted(NEUTRAL_SCORE);
    }
    let hits = count_hits(meetings, stat, threshold);
    let rate = Decimal::from(hits * 100) / Decimal::from(meetings.len());
    Factor::Measured(round_half_up(rate, 2))
}

pub fn game_context(home_factor: Decimal, defense: Factor, matchup: Factor) -> GameContext {
    let score = clamp_score(matchup.value() * home_factor * defense.value());
    GameContext {
        home_factor,
        defense_factor: defense,
        matchup,
        score: round_half_up(score, 2),
    }
}
