//! Exponential-decay weighted hit score over the most recent games.
//!
//! Game `i` (0 = most recent) carries weight `e^(-0.15·i)`. A hit scores 1.0;
//! a miss earns partial credit `1 + (actual − threshold) / threshold`, floored
//! at zero, so a 10 against a threshold of 20 still counts for half.

use rust_decimal::Decimal;

use super::{round_half_up, to_decimal, Factor};
use crate::db::models::{GameStatLine, Stat};

/// Games considered, regardless of the requested period.
pub const RECENCY_GAMES: usize = 10;
pub const DECAY_RATE: f64 = 0.15;

pub fn decay_weight(index: usize) -> f64 {
    (-DECAY_RATE * index as f64).exp()
}

pub fn hit_weight(actual: i32, threshold: u32) -> f64 {
    let threshold = threshold as f64;
    let actual = actual as f64;
    if actual >= threshold {
        1.0
    } else {
        (1.0 + (actual - threshold) / threshold).max(0.0)
    }
}

/// Weighted score in [0, 100], scale 2. No history scores 0, not the neutral 50.
pub fn recency_score(history: &[GameStatLine], stat: Stat, threshold: u32) -> Factor {
    let recent = &history[..RECENCY_GAMES.min(history.len())];
    if recent.is_empty() {
        return Factor::Defaulted(round_half_up(Decimal::ZERO, 2));
    }

    let (weighted, total) = recent
        .iter()
        .enumerate()
        .fold((0.0f64, 0.0f64), |(weighted, total), (i, game)| {
            let w = decay_weight(i);
            (weighted + w * hit_weight(game.value(stat), threshold), total + w)
        });

    Factor::Measured(round_half_up(to_decimal(100.0 * weighted / total), 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::lines_with_points;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn three_game_near_miss_scenario() {
        let games = lines_with_points(1, 30, &[30, 10, 30]);
        assert_relative_eq!(hit_weight(10, 20), 0.5, epsilon = 1e-12);

        let expected = 100.0 * (1.0 + 0.5 * (-0.15f64).exp() + (-0.30f64).exp())
            / (1.0 + (-0.15f64).exp() + (-0.30f64).exp());
        let score = recency_score(&games, Stat::Points, 20);
        assert_eq!(score, Factor::Measured(dec!(83.46)));
        assert_relative_eq!(expected, 83.4576, epsilon = 1e-4);
    }

    #[test]
    fn empty_history_scores_zero() {
        let score = recency_score(&[], Stat::Points, 20);
        assert_eq!(score.value(), Decimal::ZERO);
        assert!(score.is_defaulted());
    }

    #[test]
    fn partial_credit_never_goes_negative() {
        assert_eq!(hit_weight(0, 20), 0.0);
        assert_eq!(hit_weight(-5, 20), 0.0);
        assert_eq!(hit_weight(25, 20), 1.0);
    }

    #[test]
    fn only_ten_most_recent_games_count() {
        let mut points = vec![30; 10];
        points.extend(vec![0; 5]);
        let games = lines_with_points(1, 40, &points);
        assert_eq!(recency_score(&games, Stat::Points, 20).value(), dec!(100.00));
    }

    #[test]
    fn raising_scoring_never_lowers_the_score() {
        let base = [12, 25, 8, 19, 22, 15, 30, 5, 18, 21];
        let mut previous = recency_score(&lines_with_points(1, 40, &base), Stat::Points, 20).value();
        for bump in 1..=15 {
            let raised: Vec<i32> = base.iter().map(|p| p + bump).collect();
            let score = recency_score(&lines_with_points(1, 40, &raised), Stat::Points, 20).value();
            assert!(score >= previous, "bump {} lowered score {} -> {}", bump, previous, score);
            previous = score;
        }
    }
}
