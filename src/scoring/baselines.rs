use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// League-wide reference values the scorers normalize against.
///
/// `blowout_rating_default` (100.00) and `defensive_rating` (110.00) disagree
/// about what an "average" rating is. Both are kept as separate knobs: the
/// first fills in missing net-rating data for team strength, the second is
/// the defensive baseline for the game-context scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeagueBaselines {
    pub pie: Decimal,
    pub usage_pct: Decimal,
    pub true_shooting_pct: Decimal,
    pub assist_pct: Decimal,
    pub rebound_pct: Decimal,
    pub defensive_rating: Decimal,
    pub blowout_rating_default: Decimal,
    pub pace: Decimal,
}

impl Default for LeagueBaselines {
    fn default() -> Self {
        LeagueBaselines {
            pie: dec!(0.100),
            usage_pct: dec!(20.00),
            true_shooting_pct: dec!(55.00),
            assist_pct: dec!(15.00),
            rebound_pct: dec!(10.00),
            defensive_rating: dec!(110.00),
            blowout_rating_default: dec!(100.00),
            pace: dec!(100.00),
        }
    }
}
