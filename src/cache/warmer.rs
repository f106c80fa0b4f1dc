//! Tiered cache warming.
//!
//! A run health-checks the store, stages every entry of every tier in
//! memory, and only then writes them. Any upstream failure while staging
//! aborts the run before a single key is written, so the previous contents
//! stay in place until a later run succeeds.
//!
//! Tiers run one after another:
//! - **High**: today's slate plus recent games, per-period averages and
//!   hit rates at every listed threshold for every rostered player in it.
//!   Players are staged in parallel on the blocking pool.
//! - **Medium**: the game list of each trailing day.
//! - **Low**: reserved, stages nothing.
//!
//! Before the staged entries are written, every existing entry of a warmed
//! player is evicted. Read-path entries at unlisted thresholds would
//! otherwise keep serving values computed from an older history.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate};
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::keys::{
    historical_games_key, hit_rate_key, player_patterns, player_stats_key, recent_games_key,
    todays_games_key, CacheDomain, CacheTtls,
};
use super::metrics::MetricsSink;
use super::store::CacheStore;
use crate::clock::Clock;
use crate::db::models::{GameStatLine, PlayerId, Stat, TimePeriod};
use crate::db::GameHistoryReader;
use crate::scoring::{ConfidenceEngine, HitRateSummary};

/// Games kept under a `recent_games` key.
const RECENT_GAMES_KEPT: usize = 20;

/// Shared handle to the outcome of the latest run.
pub type LastWarmReport = Arc<RwLock<Option<WarmReport>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierReport {
    pub tier: WarmTier,
    pub entries: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum WarmOutcome {
    Completed,
    HealthCheckFailed(String),
    StagingFailed(String),
    CommitFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmReport {
    pub started_at: DateTime<FixedOffset>,
    pub for_date: NaiveDate,
    pub tiers: Vec<TierReport>,
    /// Keys written during the commit phase.
    pub committed: usize,
    /// Stale player entries removed before the writes.
    pub evicted: usize,
    pub elapsed_ms: u64,
    pub outcome: WarmOutcome,
}

impl WarmReport {
    pub fn is_success(&self) -> bool {
        self.outcome == WarmOutcome::Completed
    }
}

/// Averages of every category over one window, stored under `player_stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatsSnapshot {
    pub player_id: PlayerId,
    pub period: TimePeriod,
    pub games: usize,
    pub points: Decimal,
    pub assists: Decimal,
    pub rebounds: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmSettings {
    /// Trailing days staged by the medium tier.
    pub backfill_days: u32,
    /// Players staged at once in the high tier.
    pub concurrency: usize,
    /// The health check fails below this much free store memory.
    pub min_free_bytes: u64,
}

impl Default for WarmSettings {
    fn default() -> Self {
        WarmSettings {
            backfill_days: 7,
            concurrency: 8,
            min_free_bytes: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct StagedEntry {
    key: String,
    value: String,
    ttl: Duration,
}

/// One tier's output: entries to write and players whose old entries go.
#[derive(Debug, Default)]
struct StagedTier {
    entries: Vec<StagedEntry>,
    players: Vec<PlayerId>,
}

fn stage<T: Serialize>(key: String, value: &T, ttl: Duration) -> anyhow::Result<StagedEntry> {
    Ok(StagedEntry {
        key,
        value: serde_json::to_string(value)?,
        ttl,
    })
}

pub struct CacheWarmer<R> {
    engine: Arc<ConfidenceEngine<R>>,
    store: Arc<dyn CacheStore>,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    ttls: CacheTtls,
    settings: WarmSettings,
    last_report: LastWarmReport,
}

impl<R> CacheWarmer<R>
where
    R: GameHistoryReader + 'static,
{
    pub fn new(
        engine: Arc<ConfidenceEngine<R>>,
        store: Arc<dyn CacheStore>,
        metrics: Arc<dyn MetricsSink>,
        clock: Arc<dyn Clock>,
        ttls: CacheTtls,
        settings: WarmSettings,
    ) -> Self {
        CacheWarmer {
            engine,
            store,
            metrics,
            clock,
            ttls,
            settings,
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    pub fn last_report(&self) -> LastWarmReport {
        self.last_report.clone()
    }

    /// One full warming pass. The returned report is also kept for
    /// [`last_report`](Self::last_report).
    pub async fn run(&self) -> WarmReport {
        let started_at = self.clock.now();
        let today = started_at.date_naive();
        let timer = Instant::now();
        info!("Cache warming started for {}", today);

        let mut tiers = Vec::new();
        let mut committed = 0;
        let mut evicted = 0;
        let outcome = match self
            .warm(today, &mut tiers, &mut committed, &mut evicted)
            .await
        {
            Ok(()) => WarmOutcome::Completed,
            Err(failure) => {
                self.metrics.record_error();
                error!("Cache warming for {} aborted: {:?}", today, failure);
                failure
            }
        };

        let report = WarmReport {
            started_at,
            for_date: today,
            tiers,
            committed,
            evicted,
            elapsed_ms: timer.elapsed().as_millis() as u64,
            outcome,
        };
        if report.is_success() {
            info!(
                "Cache warming finished: {} entries ({} evicted) in {} ms",
                report.committed, report.evicted, report.elapsed_ms
            );
        }
        *self.last_report.write().await = Some(report.clone());
        report
    }

    async fn warm(
        &self,
        today: NaiveDate,
        tiers: &mut Vec<TierReport>,
        committed: &mut usize,
        evicted: &mut usize,
    ) -> Result<(), WarmOutcome> {
        self.check_health().await?;

        let mut staged = Vec::new();
        let mut players = BTreeSet::new();
        for tier in [WarmTier::High, WarmTier::Medium, WarmTier::Low] {
            let timer = Instant::now();
            let output = match tier {
                WarmTier::High => self.stage_high(today).await,
                WarmTier::Medium => self.stage_medium(today),
                WarmTier::Low => Ok(StagedTier::default()),
            }
            .map_err(|e| WarmOutcome::StagingFailed(format!("{:?} tier: {:#}", tier, e)))?;

            let report = TierReport {
                tier,
                entries: output.entries.len(),
                elapsed_ms: timer.elapsed().as_millis() as u64,
            };
            info!(
                "Staged {:?} tier: {} entries in {} ms",
                tier, report.entries, report.elapsed_ms
            );
            tiers.push(report);
            staged.extend(output.entries);
            players.extend(output.players);
        }

        for player in players {
            for pattern in player_patterns(player) {
                *evicted += self
                    .store
                    .delete_by_pattern(&pattern)
                    .await
                    .map_err(|e| WarmOutcome::CommitFailed(format!("evict {}: {:#}", pattern, e)))?;
            }
        }
        debug!("Evicted {} stale player entries", evicted);

        for entry in staged {
            self.store
                .set_with_ttl(&entry.key, entry.value, entry.ttl)
                .await
                .map_err(|e| WarmOutcome::CommitFailed(format!("{}: {:#}", entry.key, e)))?;
            *committed += 1;
        }
        Ok(())
    }

    async fn check_health(&self) -> Result<(), WarmOutcome> {
        match self.store.health().await {
            Ok(h) if h.available_memory_bytes >= self.settings.min_free_bytes => {
                info!(
                    "Cache store healthy: {} keys, {} bytes free",
                    h.key_count, h.available_memory_bytes
                );
                Ok(())
            }
            Ok(h) => Err(WarmOutcome::HealthCheckFailed(format!(
                "{} bytes free, need {}",
                h.available_memory_bytes, self.settings.min_free_bytes
            ))),
            Err(e) => Err(WarmOutcome::HealthCheckFailed(format!("{:#}", e))),
        }
    }

    async fn stage_high(&self, today: NaiveDate) -> anyhow::Result<StagedTier> {
        let reader = self.engine.reader();
        let games = reader.games_on(today)?;
        let mut entries = vec![stage(
            todays_games_key(today),
            &games,
            self.ttls.for_domain(CacheDomain::TodaysGames),
        )?];

        let mut players = BTreeSet::new();
        for game in &games {
            players.extend(reader.roster(game.home_team)?);
            players.extend(reader.roster(game.away_team)?);
        }
        info!(
            "{} games today, warming {} players",
            games.len(),
            players.len()
        );

        let results: Vec<_> = stream::iter(players.iter().copied())
            .map(|player| {
                let engine = self.engine.clone();
                let ttls = self.ttls;
                tokio::task::spawn_blocking(move || stage_player(&engine, player, &ttls))
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            entries.extend(result??);
        }
        Ok(StagedTier {
            entries,
            players: players.into_iter().collect(),
        })
    }

    fn stage_medium(&self, today: NaiveDate) -> anyhow::Result<StagedTier> {
        let ttl = self.ttls.for_domain(CacheDomain::HistoricalGames);
        let mut entries = Vec::with_capacity(self.settings.backfill_days as usize);
        for offset in 1..=self.settings.backfill_days {
            let date = today - ChronoDuration::days(offset as i64);
            let games = self.engine.reader().games_on(date)?;
            if games.is_empty() {
                debug!("No games recorded on {}", date);
            }
            entries.push(stage(historical_games_key(date), &games, ttl)?);
        }
        Ok(StagedTier {
            entries,
            players: Vec::new(),
        })
    }
}

/// Everything cached for one player. Values match what the read path
/// computes from the same snapshot.
fn stage_player<R: GameHistoryReader>(
    engine: &ConfidenceEngine<R>,
    player: PlayerId,
    ttls: &CacheTtls,
) -> anyhow::Result<Vec<StagedEntry>> {
    let history = engine.reader().recent_games(player)?;
    let recent: &[GameStatLine] = &history[..RECENT_GAMES_KEPT.min(history.len())];

    let mut entries = vec![stage(
        recent_games_key(player),
        &recent,
        ttls.for_domain(CacheDomain::RecentGames),
    )?];

    for period in TimePeriod::ALL {
        let summaries: Vec<(Stat, u32, HitRateSummary)> = Stat::ALL
            .iter()
            .flat_map(|&stat| stat.valid_thresholds().iter().map(move |&t| (stat, t)))
            .map(|(stat, threshold)| {
                (stat, threshold, engine.hit_rate_from_history(&history, stat, threshold, period))
            })
            .collect();

        // averages do not depend on the threshold
        let average = |wanted: Stat| {
            summaries
                .iter()
                .find(|(stat, _, _)| *stat == wanted)
                .map_or(Decimal::ZERO, |(_, _, s)| s.average)
        };
        let snapshot = PlayerStatsSnapshot {
            player_id: player,
            period,
            games: summaries.first().map_or(0, |(_, _, s)| s.games),
            points: average(Stat::Points),
            assists: average(Stat::Assists),
            rebounds: average(Stat::Rebounds),
        };
        entries.push(stage(
            player_stats_key(player, period),
            &snapshot,
            ttls.for_domain(CacheDomain::PlayerStats),
        )?);

        for (stat, threshold, summary) in &summaries {
            entries.push(stage(
                hit_rate_key(player, (*stat).into(), *threshold, period),
                summary,
                ttls.for_domain(CacheDomain::HitRates),
            )?);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memo::ScoreCache;
    use crate::cache::metrics::CacheMetrics;
    use crate::cache::store::{MemoryCacheStore, StoreHealth};
    use crate::clock::FixedClock;
    use crate::db::fixtures::*;
    use crate::db::models::{Game, StatCategory};
    use crate::scoring::{EngineSettings, WindowPolicy};
    use async_trait::async_trait;
    use chrono::TimeZone;

    const HOUR: Duration = Duration::from_secs(3600);

    fn clock_on(n: u32) -> Arc<dyn Clock> {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let at = day(n).and_hms_opt(4, 30, 0).unwrap();
        Arc::new(FixedClock(offset.from_local_datetime(&at).unwrap()))
    }

    /// Two teams play on day 41; players 42 (team 1) and 7 (team 2).
    fn league() -> InMemoryHistory {
        let mut lines = lines_with_points(42, 39, &[25, 25, 25, 25, 25, 15, 15, 15, 15, 15]);
        lines.extend(lines_with_points(7, 39, &[12, 9, 14]).into_iter().map(|mut l| {
            l.team_id = 2;
            l
        }));
        let history: Vec<Game> = (34..=40)
            .map(|d| final_game(2_000 + d as u64, day(d), 3, 4, 100, 90))
            .collect();
        InMemoryHistory::new()
            .with_roster(1, vec![42])
            .with_roster(2, vec![7])
            .with_lines(lines)
            .with_games(history)
            .with_games(vec![scheduled_game(500, day(41), 1, 2)])
    }

    fn warmer(
        reader: InMemoryHistory,
        store: Arc<dyn CacheStore>,
        metrics: Arc<dyn MetricsSink>,
        settings: WarmSettings,
    ) -> CacheWarmer<InMemoryHistory> {
        CacheWarmer::new(
            Arc::new(ConfidenceEngine::new(reader, EngineSettings::default())),
            store,
            metrics,
            clock_on(41),
            CacheTtls::default(),
            settings,
        )
    }

    #[tokio::test]
    async fn full_run_stages_and_commits_every_tier() {
        let store = Arc::new(MemoryCacheStore::new(1 << 22));
        let w = warmer(league(), store.clone(), Arc::new(CacheMetrics::new()), WarmSettings::default());
        let report = w.run().await;

        assert!(report.is_success(), "{:?}", report.outcome);
        assert_eq!(report.for_date, day(41));
        let counts: Vec<_> = report.tiers.iter().map(|t| (t.tier, t.entries)).collect();
        // high: today's slate + per player (1 recent + 5 stats + 5 × 21 hit rates)
        assert_eq!(
            counts,
            vec![(WarmTier::High, 1 + 2 * 111), (WarmTier::Medium, 7), (WarmTier::Low, 0)]
        );
        assert_eq!(report.committed, 230);
        assert_eq!(report.evicted, 0);

        assert!(store.has_key("todays_games:2024-02-10").await.unwrap());
        assert!(store.has_key("historical_games:2024-02-03").await.unwrap());
        assert!(store.has_key("player_stats:7:all:season").await.unwrap());
        let raw = store.get("hitrate:42:points:20:l10").await.unwrap().unwrap();
        let summary: HitRateSummary = serde_json::from_str(&raw).unwrap();
        assert_eq!(summary.hit_rate.to_string(), "50.0");
        assert!(store.has_key("hitrate:42:points:35:season").await.unwrap());
        assert!(store.has_key("hitrate:7:assists:12:l5").await.unwrap());
        assert!(!store.has_key("hitrate:42:points:23:l10").await.unwrap());

        assert_eq!(w.last_report().read().await.as_ref(), Some(&report));
    }

    #[tokio::test]
    async fn warmed_entries_serve_the_read_path() {
        let store = Arc::new(MemoryCacheStore::new(1 << 22));
        let metrics = Arc::new(CacheMetrics::new());
        let w = warmer(league(), store.clone(), metrics.clone(), WarmSettings::default());
        assert!(w.run().await.is_success());

        let cache = ScoreCache::new(
            store,
            metrics.clone(),
            CacheTtls::default(),
            WindowPolicy::Strict,
        );
        let engine = ConfidenceEngine::new(league(), EngineSettings::default());
        let cached = cache
            .hit_rate(&engine, 42, StatCategory::Points, 20, TimePeriod::L10)
            .await
            .unwrap();
        let direct = engine
            .calculate_hit_rate(42, StatCategory::Points, 20, TimePeriod::L10)
            .unwrap();
        assert_eq!(cached, direct);
        assert_eq!(metrics.snapshot().hits, 1);
    }

    #[tokio::test]
    async fn warming_evicts_read_path_entries_of_warmed_players() {
        let store = Arc::new(MemoryCacheStore::new(1 << 22));
        let metrics = Arc::new(CacheMetrics::new());
        let cache = ScoreCache::new(
            store.clone(),
            metrics.clone(),
            CacheTtls::default(),
            WindowPolicy::Strict,
        );

        // 23 is not a listed threshold, so only the read path writes it
        let before = cache
            .hit_rate(
                &ConfidenceEngine::new(league(), EngineSettings::default()),
                42,
                StatCategory::Points,
                23,
                TimePeriod::Season,
            )
            .await
            .unwrap();
        assert_eq!(before.hit_rate.to_string(), "50.0");
        store
            .set_with_ttl("hitrate:420:points:23:season", "{}".into(), HOUR)
            .await
            .unwrap();

        let mut updated = league();
        updated.lines.push(line(42, 1040, day(40), 0));
        let report = warmer(updated.clone(), store.clone(), metrics.clone(), WarmSettings::default())
            .run()
            .await;
        assert!(report.is_success(), "{:?}", report.outcome);
        assert_eq!(report.evicted, 1);
        assert!(store.has_key("hitrate:420:points:23:season").await.unwrap());

        let engine = ConfidenceEngine::new(updated, EngineSettings::default());
        let after = cache
            .hit_rate(&engine, 42, StatCategory::Points, 23, TimePeriod::Season)
            .await
            .unwrap();
        let direct = engine
            .calculate_hit_rate(42, StatCategory::Points, 23, TimePeriod::Season)
            .unwrap();
        assert_eq!(after, direct);
        assert_ne!(after, before);
        assert_eq!(after.games, 11);
    }

    struct UnhealthyStore;

    #[async_trait]
    impl CacheStore for UnhealthyStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn set_with_ttl(&self, key: &str, _value: String, _ttl: Duration) -> anyhow::Result<()> {
            panic!("unexpected write to {}", key)
        }
        async fn has_key(&self, _key: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn delete_by_pattern(&self, _pattern: &str) -> anyhow::Result<usize> {
            Ok(0)
        }
        async fn health(&self) -> anyhow::Result<StoreHealth> {
            anyhow::bail!("store unreachable")
        }
    }

    #[tokio::test]
    async fn failed_health_check_aborts_before_warming() {
        let metrics = Arc::new(CacheMetrics::new());
        let w = warmer(league(), Arc::new(UnhealthyStore), metrics.clone(), WarmSettings::default());
        let report = w.run().await;
        assert!(matches!(report.outcome, WarmOutcome::HealthCheckFailed(_)));
        assert!(report.tiers.is_empty());
        assert_eq!(report.committed, 0);
        assert_eq!(metrics.snapshot().errors, 1);
    }

    #[tokio::test]
    async fn low_headroom_fails_the_health_check() {
        let store = Arc::new(MemoryCacheStore::new(100));
        let settings = WarmSettings {
            min_free_bytes: 1_000,
            ..WarmSettings::default()
        };
        let report = warmer(league(), store.clone(), Arc::new(CacheMetrics::new()), settings)
            .run()
            .await;
        assert!(matches!(report.outcome, WarmOutcome::HealthCheckFailed(_)));
        assert_eq!(store.health().await.unwrap().key_count, 0);
    }

    #[tokio::test]
    async fn upstream_failure_leaves_previous_contents_untouched() {
        let store = Arc::new(MemoryCacheStore::new(1 << 22));
        store
            .set_with_ttl("hitrate:42:points:20:l10", "previous".into(), HOUR)
            .await
            .unwrap();
        let metrics = Arc::new(CacheMetrics::new());
        let w = warmer(league().unavailable(), store.clone(), metrics.clone(), WarmSettings::default());
        let report = w.run().await;

        assert!(matches!(report.outcome, WarmOutcome::StagingFailed(_)));
        assert_eq!(report.committed, 0);
        assert_eq!(store.health().await.unwrap().key_count, 1);
        assert_eq!(
            store.get("hitrate:42:points:20:l10").await.unwrap().as_deref(),
            Some("previous")
        );
        assert_eq!(metrics.snapshot().errors, 1);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let store = Arc::new(MemoryCacheStore::new(1 << 22));
        let w = warmer(league(), store.clone(), Arc::new(CacheMetrics::new()), WarmSettings::default());
        w.run().await;
        let first = store.get("player_stats:42:all:l10").await.unwrap();
        let keys = store.health().await.unwrap().key_count;
        w.run().await;
        assert_eq!(store.get("player_stats:42:all:l10").await.unwrap(), first);
        assert_eq!(store.health().await.unwrap().key_count, keys);
    }
}
