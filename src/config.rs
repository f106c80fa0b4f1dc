use anyhow::Context;
use chrono::{FixedOffset, NaiveTime};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

use crate::cache::{parse_warm_time, CacheTtls, WarmSettings};
use crate::db::models::TimePeriod;
use crate::scoring::{
    AdvancedWeighting, EngineSettings, HomeCourtFactors, LeagueBaselines, ScoringStrategy,
    WindowPolicy,
};

/// Player prop confidence scoring with a scheduled score cache
#[derive(Parser, Debug, Clone)]
#[command(name = "propscore", version, about)]
pub struct Config {
    /// SQLite database holding game history
    #[arg(long, env = "DATABASE_PATH", default_value = "propscore.db")]
    pub database_path: String,

    /// Monitor listen address
    #[arg(long, env = "MONITOR_ADDR", default_value = "0.0.0.0:8080")]
    pub monitor_addr: String,

    /// Operating region offset from UTC in minutes (e.g. -300 for US Eastern)
    #[arg(long, env = "UTC_OFFSET_MINUTES", default_value = "-300", allow_hyphen_values = true)]
    pub utc_offset_minutes: i32,

    /// Local time of the daily warming run (HH:MM)
    #[arg(long, env = "WARM_AT", default_value = "04:30")]
    pub warm_at: String,

    /// Run one warming pass immediately at startup
    #[arg(long, env = "WARM_ON_START", default_value = "false")]
    pub warm_on_start: bool,

    /// TTL of cached recent-games lists in seconds
    #[arg(long, env = "RECENT_GAMES_TTL_SECS", default_value = "14400")]
    pub recent_games_ttl_secs: u64,

    /// Trailing days staged by the medium warming tier
    #[arg(long, env = "BACKFILL_DAYS", default_value = "7")]
    pub backfill_days: u32,

    /// Players warmed in parallel
    #[arg(long, env = "WARM_CONCURRENCY", default_value = "8")]
    pub warm_concurrency: usize,

    /// Capacity of the in-memory cache store in bytes
    #[arg(long, env = "CACHE_CAPACITY_BYTES", default_value = "268435456")]
    pub cache_capacity_bytes: u64,

    /// Free store memory required by the pre-warming health check
    #[arg(long, env = "MIN_FREE_CACHE_BYTES", default_value = "16777216")]
    pub min_free_cache_bytes: u64,

    /// Composition used by `calculate_confidence_score`
    #[arg(long, env = "SCORING_STRATEGY", value_enum, default_value = "dashboard-refresh")]
    pub scoring_strategy: StrategyArg,

    /// Advanced-metrics weighting scheme
    #[arg(long, env = "ADVANCED_WEIGHTING", value_enum, default_value = "normalized")]
    pub advanced_weighting: WeightingArg,

    /// Minimum-games policy for hit-rate windows
    #[arg(long, env = "WINDOW_POLICY", value_enum, default_value = "strict")]
    pub window_policy: WindowPolicyArg,

    /// Home/away factor table
    #[arg(long, env = "HOME_COURT", value_enum, default_value = "standard")]
    pub home_court: HomeCourtArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    DashboardRefresh,
    SinglePick,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightingArg {
    Normalized,
    RawRatings,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicyArg {
    Strict,
    Lenient,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeCourtArg {
    Standard,
    VenueNormalized,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.monitor_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid monitor_addr '{}'", self.monitor_addr))?;
        self.utc_offset()?;
        self.warm_time()?;
        if self.recent_games_ttl_secs == 0 {
            anyhow::bail!("recent_games_ttl_secs must be positive");
        }
        if self.warm_concurrency == 0 {
            anyhow::bail!("warm_concurrency must be at least 1");
        }
        if self.min_free_cache_bytes > self.cache_capacity_bytes {
            anyhow::bail!("min_free_cache_bytes cannot exceed cache_capacity_bytes");
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).with_context(|| {
            format!("utc_offset_minutes {} is out of range", self.utc_offset_minutes)
        })
    }

    pub fn warm_time(&self) -> anyhow::Result<NaiveTime> {
        parse_warm_time(&self.warm_at)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            baselines: LeagueBaselines::default(),
            home_court: match self.home_court {
                HomeCourtArg::Standard => HomeCourtFactors::STANDARD,
                HomeCourtArg::VenueNormalized => HomeCourtFactors::VENUE_NORMALIZED,
            },
            window_policy: match self.window_policy {
                WindowPolicyArg::Strict => WindowPolicy::Strict,
                WindowPolicyArg::Lenient => WindowPolicy::Lenient,
            },
            strategy: match self.scoring_strategy {
                StrategyArg::DashboardRefresh => ScoringStrategy::DashboardRefresh,
                StrategyArg::SinglePick => ScoringStrategy::SinglePick,
            },
            advanced_weighting: match self.advanced_weighting {
                WeightingArg::Normalized => AdvancedWeighting::NormalizedBaseline,
                WeightingArg::RawRatings => AdvancedWeighting::RawRatings,
            },
            base_period: TimePeriod::L10,
        }
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls::with_recent_games(Duration::from_secs(self.recent_games_ttl_secs))
    }

    pub fn warm_settings(&self) -> WarmSettings {
        WarmSettings {
            backfill_days: self.backfill_days,
            concurrency: self.warm_concurrency,
            min_free_bytes: self.min_free_cache_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("propscore").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let c = parse(&[]);
        c.validate().unwrap();
        assert_eq!(c.engine_settings(), EngineSettings::default());
        assert_eq!(c.cache_ttls(), CacheTtls::default());
        assert_eq!(c.utc_offset().unwrap().local_minus_utc(), -300 * 60);
        assert_eq!(c.warm_time().unwrap(), NaiveTime::from_hms_opt(4, 30, 0).unwrap());
    }

    #[test]
    fn enum_flags_map_to_engine_settings() {
        let c = parse(&[
            "--scoring-strategy",
            "single-pick",
            "--advanced-weighting",
            "raw-ratings",
            "--window-policy",
            "lenient",
            "--home-court",
            "venue-normalized",
        ]);
        let s = c.engine_settings();
        assert_eq!(s.strategy, ScoringStrategy::SinglePick);
        assert_eq!(s.advanced_weighting, AdvancedWeighting::RawRatings);
        assert_eq!(s.window_policy, WindowPolicy::Lenient);
        assert_eq!(s.home_court, HomeCourtFactors::VENUE_NORMALIZED);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--warm-at", "4:30pm"]).validate().is_err());
        assert!(parse(&["--utc-offset-minutes", "2000"]).validate().is_err());
        assert!(parse(&["--warm-concurrency", "0"]).validate().is_err());
        assert!(parse(&["--monitor-addr", "nowhere"]).validate().is_err());
        assert!(parse(&["--cache-capacity-bytes", "10", "--min-free-cache-bytes", "20"])
            .validate()
            .is_err());
        assert!(Config::try_parse_from(["propscore", "--scoring-strategy", "fastest"]).is_err());
    }

    #[test]
    fn negative_offsets_parse() {
        let c = parse(&["--utc-offset-minutes", "-480"]);
        assert_eq!(c.utc_offset().unwrap().local_minus_utc(), -480 * 60);
    }
}
