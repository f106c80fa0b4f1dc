use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub type PlayerId = u64;
pub type TeamId = u64;
pub type GameId = u64;

/// One player's box-score line for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatLine {
    pub player_id: PlayerId,
    pub game_id: GameId,
    /// Team the player suited up for in this game
    pub team_id: TeamId,
    pub game_date: NaiveDate,
    pub points: i32,
    pub assists: i32,
    pub rebounds: i32,
    pub minutes: f64,
}

impl GameStatLine {
    pub fn value(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Points => self.points,
            Stat::Assists => self.assists,
            Stat::Rebounds => self.rebounds,
        }
    }
}

/// Advanced metrics for one player-game (or one team-game when read through
/// `team_stats_in_range`). Percentages are on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedStatLine {
    pub subject_id: u64,
    pub game_id: GameId,
    pub game_date: NaiveDate,
    /// Player Impact Estimate, [-0.100, 0.300]
    pub pie: f64,
    pub pace: f64,
    pub usage_pct: f64,
    pub true_shooting_pct: f64,
    pub assist_pct: f64,
    pub assist_ratio: f64,
    pub rebound_pct: f64,
    pub offensive_rebound_pct: f64,
    pub defensive_rebound_pct: f64,
    pub offensive_rating: f64,
    pub defensive_rating: f64,
    pub net_rating: f64,
}

impl AdvancedStatLine {
    /// Whether every metric sits inside its documented range.
    pub fn is_within_bounds(&self) -> bool {
        let pct = 0.0..=100.0;
        let rating = 60.0..=160.0;
        (-0.100..=0.300).contains(&self.pie)
            && (80.0..=130.0).contains(&self.pace)
            && pct.contains(&self.usage_pct)
            && pct.contains(&self.true_shooting_pct)
            && pct.contains(&self.assist_pct)
            && (0.0..=60.0).contains(&self.assist_ratio)
            && pct.contains(&self.rebound_pct)
            && pct.contains(&self.offensive_rebound_pct)
            && pct.contains(&self.defensive_rebound_pct)
            && rating.contains(&self.offensive_rating)
            && rating.contains(&self.defensive_rating)
            && (-60.0..=60.0).contains(&self.net_rating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Scheduled,
    Final,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Final => "final",
        }
    }

    /// Inverse of [`as_str`](Self::as_str), ignoring case and padding.
    /// Anything else is a game that has not finished.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "final" => GameStatus::Final,
            _ => GameStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub game_date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub status: GameStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

impl Game {
    pub fn is_final(&self) -> bool {
        self.status == GameStatus::Final
    }

    /// Opponent of `team` in this game, if `team` played in it.
    pub fn opponent_of(&self, team: TeamId) -> Option<TeamId> {
        if team == self.home_team {
            Some(self.away_team)
        } else if team == self.away_team {
            Some(self.home_team)
        } else {
            None
        }
    }

    /// Absolute final margin; `None` until both scores are known.
    pub fn margin(&self) -> Option<i32> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) if self.is_final() => Some((h - a).abs()),
            _ => None,
        }
    }
}

/// Category as requested by callers. `All` only exists for aggregate
/// dashboard queries and is rejected by every per-threshold computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatCategory {
    Points,
    Assists,
    Rebounds,
    All,
}

impl StatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatCategory::Points => "points",
            StatCategory::Assists => "assists",
            StatCategory::Rebounds => "rebounds",
            StatCategory::All => "all",
        }
    }
}

/// A category that can be scored against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    Points,
    Assists,
    Rebounds,
}

impl Stat {
    pub const ALL: [Stat; 3] = [Stat::Points, Stat::Assists, Stat::Rebounds];

    pub fn as_str(&self) -> &'static str {
        StatCategory::from(*self).as_str()
    }

    pub fn default_threshold(&self) -> u32 {
        match self {
            Stat::Points => 20,
            Stat::Assists => 5,
            Stat::Rebounds => 8,
        }
    }

    pub fn valid_thresholds(&self) -> &'static [u32] {
        match self {
            Stat::Points => &[10, 15, 20, 25, 30, 35, 40],
            Stat::Assists => &[3, 4, 5, 6, 7, 8, 10, 12],
            Stat::Rebounds => &[4, 6, 8, 10, 12, 14],
        }
    }
}

impl From<Stat> for StatCategory {
    fn from(stat: Stat) -> Self {
        match stat {
            Stat::Points => StatCategory::Points,
            Stat::Assists => StatCategory::Assists,
            Stat::Rebounds => StatCategory::Rebounds,
        }
    }
}

impl TryFrom<StatCategory> for Stat {
    type Error = CoreError;

    fn try_from(category: StatCategory) -> Result<Self, Self::Error> {
        match category {
            StatCategory::Points => Ok(Stat::Points),
            StatCategory::Assists => Ok(Stat::Assists),
            StatCategory::Rebounds => Ok(Stat::Rebounds),
            StatCategory::All => Err(CoreError::InvalidArgument(
                "category ALL cannot be scored against a threshold".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    L5,
    L10,
    L15,
    L20,
    Season,
}

impl TimePeriod {
    pub const ALL: [TimePeriod; 5] = [
        TimePeriod::L5,
        TimePeriod::L10,
        TimePeriod::L15,
        TimePeriod::L20,
        TimePeriod::Season,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::L5 => "l5",
            TimePeriod::L10 => "l10",
            TimePeriod::L15 => "l15",
            TimePeriod::L20 => "l20",
            TimePeriod::Season => "season",
        }
    }
}
