//! Deterministic cache keys and the TTL table.
//!
//! Keys look like `{domain}:{entity}:{category}:{threshold}:{period}`. Every
//! key is lower-cased, whitespace becomes `_` and anything outside
//! `[a-z0-9_:-]` is dropped, so the same inputs always land on the same key.

use chrono::NaiveDate;
use std::fmt::Display;
use std::time::Duration;

use crate::db::models::{PlayerId, StatCategory, TimePeriod};

const HOUR: u64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheDomain {
    TodaysGames,
    HitRates,
    PlayerStats,
    RecentGames,
    HistoricalGames,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 5] = [
        CacheDomain::TodaysGames,
        CacheDomain::HitRates,
        CacheDomain::PlayerStats,
        CacheDomain::RecentGames,
        CacheDomain::HistoricalGames,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            CacheDomain::TodaysGames => "todays_games",
            CacheDomain::HitRates => "hitrate",
            CacheDomain::PlayerStats => "player_stats",
            CacheDomain::RecentGames => "recent_games",
            CacheDomain::HistoricalGames => "historical_games",
        }
    }
}

/// Time-to-live per domain. Only the recent-games TTL is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub todays_games: Duration,
    pub hit_rates: Duration,
    pub player_stats: Duration,
    pub recent_games: Duration,
    pub historical_games: Duration,
}

impl CacheTtls {
    pub fn with_recent_games(recent_games: Duration) -> Self {
        CacheTtls {
            recent_games,
            ..Self::default()
        }
    }

    pub fn for_domain(&self, domain: CacheDomain) -> Duration {
        match domain {
            CacheDomain::TodaysGames => self.todays_games,
            CacheDomain::HitRates => self.hit_rates,
            CacheDomain::PlayerStats => self.player_stats,
            CacheDomain::RecentGames => self.recent_games,
            CacheDomain::HistoricalGames => self.historical_games,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        CacheTtls {
            todays_games: Duration::from_secs(24 * HOUR),
            hit_rates: Duration::from_secs(24 * HOUR),
            player_stats: Duration::from_secs(6 * HOUR),
            recent_games: Duration::from_secs(4 * HOUR),
            historical_games: Duration::from_secs(24 * HOUR),
        }
    }
}

/// Lower-case, `_` for whitespace, drop everything outside `[a-z0-9_:-]`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | ':' | '-'))
        .collect()
}

fn build(domain: CacheDomain, parts: &[&dyn Display]) -> String {
    let mut key = domain.prefix().to_string();
    for part in parts {
        key.push(':');
        key.push_str(&part.to_string());
    }
    sanitize(&key)
}

/// The window policy is not part of the key; a store serves one policy.
pub fn hit_rate_key(
    player: PlayerId,
    category: StatCategory,
    threshold: u32,
    period: TimePeriod,
) -> String {
    build(
        CacheDomain::HitRates,
        &[&player, &category.as_str(), &threshold, &period.as_str()],
    )
}

/// Per-period averages; always keyed with the `all` category.
pub fn player_stats_key(player: PlayerId, period: TimePeriod) -> String {
    build(
        CacheDomain::PlayerStats,
        &[&player, &StatCategory::All.as_str(), &period.as_str()],
    )
}

pub fn recent_games_key(player: PlayerId) -> String {
    build(CacheDomain::RecentGames, &[&player])
}

pub fn todays_games_key(date: NaiveDate) -> String {
    build(CacheDomain::TodaysGames, &[&date])
}

pub fn historical_games_key(date: NaiveDate) -> String {
    build(CacheDomain::HistoricalGames, &[&date])
}

/// Patterns covering every entry that belongs to one player.
pub fn player_patterns(player: PlayerId) -> Vec<String> {
    vec![
        format!("{}:{}:*", CacheDomain::HitRates.prefix(), player),
        format!("{}:{}:*", CacheDomain::PlayerStats.prefix(), player),
        recent_games_key(player),
    ]
}
