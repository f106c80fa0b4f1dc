//! Read-through memoization of hit-rate summaries.
//!
//! The store is an optimization, never a dependency: lookup or write
//! failures are counted and logged, and the value is computed directly.
//!
//! Hit-rate keys do not carry the window policy, so one store holds values
//! for a single policy. A cache is bound to that policy and bypasses the
//! store for engines configured with another one.

use std::sync::Arc;
use tracing::{debug, warn};

use super::keys::{hit_rate_key, player_patterns, CacheDomain, CacheTtls};
use super::metrics::MetricsSink;
use super::store::CacheStore;
use crate::db::models::{PlayerId, StatCategory, TimePeriod};
use crate::db::GameHistoryReader;
use crate::error::Result;
use crate::scoring::engine::validate_request;
use crate::scoring::{ConfidenceEngine, HitRateSummary, WindowPolicy};

#[derive(Clone)]
pub struct ScoreCache {
    store: Arc<dyn CacheStore>,
    metrics: Arc<dyn MetricsSink>,
    ttls: CacheTtls,
    policy: WindowPolicy,
}

impl ScoreCache {
    /// `policy` must match the engines that populate `store`, the warmer's
    /// included.
    pub fn new(
        store: Arc<dyn CacheStore>,
        metrics: Arc<dyn MetricsSink>,
        ttls: CacheTtls,
        policy: WindowPolicy,
    ) -> Self {
        ScoreCache {
            store,
            metrics,
            ttls,
            policy,
        }
    }

    pub fn window_policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Cached [`ConfidenceEngine::calculate_hit_rate`].
    pub async fn hit_rate<R: GameHistoryReader>(
        &self,
        engine: &ConfidenceEngine<R>,
        player: PlayerId,
        category: StatCategory,
        threshold: u32,
        period: TimePeriod,
    ) -> Result<HitRateSummary> {
        validate_request(player, category, threshold)?;
        let engine_policy = engine.settings().window_policy;
        if engine_policy != self.policy {
            debug!(
                "{:?} engine on a {:?} cache, computing directly",
                engine_policy, self.policy
            );
            return engine.calculate_hit_rate(player, category, threshold, period);
        }
        let key = hit_rate_key(player, category, threshold, period);

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<HitRateSummary>(&raw) {
                Ok(summary) => {
                    self.metrics.record_hit();
                    return Ok(summary);
                }
                Err(e) => {
                    self.metrics.record_error();
                    warn!("Discarding unreadable cache entry {}: {}", key, e);
                }
            },
            Ok(None) => self.metrics.record_miss(),
            Err(e) => {
                self.metrics.record_error();
                warn!("Cache lookup for {} failed, computing directly: {}", key, e);
            }
        }

        let summary = engine.calculate_hit_rate(player, category, threshold, period)?;
        self.write(&key, &summary).await;
        Ok(summary)
    }

    async fn write(&self, key: &str, summary: &HitRateSummary) {
        let raw = match serde_json::to_string(summary) {
            Ok(raw) => raw,
            Err(e) => {
                self.metrics.record_error();
                warn!("Could not encode {}: {}", key, e);
                return;
            }
        };
        let ttl = self.ttls.for_domain(CacheDomain::HitRates);
        if let Err(e) = self.store.set_with_ttl(key, raw, ttl).await {
            self.metrics.record_error();
            warn!("Cache write for {} failed: {}", key, e);
        }
    }

    /// Drop every cached entry of `player`.
    pub async fn invalidate_player(&self, player: PlayerId) -> anyhow::Result<usize> {
        let mut removed = 0;
        for pattern in player_patterns(player) {
            removed += self.store.delete_by_pattern(&pattern).await?;
        }
        debug!("Invalidated {} cache entries for player {}", removed, player);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::metrics::CacheMetrics;
    use crate::cache::store::{MemoryCacheStore, StoreHealth};
    use crate::db::fixtures::{lines_with_points, InMemoryHistory};
    use crate::error::CoreError;
    use crate::scoring::EngineSettings;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::time::Duration;

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            bail!("connection refused")
        }
        async fn set_with_ttl(&self, _key: &str, _value: String, _ttl: Duration) -> anyhow::Result<()> {
            bail!("connection refused")
        }
        async fn has_key(&self, _key: &str) -> anyhow::Result<bool> {
            bail!("connection refused")
        }
        async fn delete_by_pattern(&self, _pattern: &str) -> anyhow::Result<usize> {
            bail!("connection refused")
        }
        async fn health(&self) -> anyhow::Result<StoreHealth> {
            bail!("connection refused")
        }
    }

    fn engine() -> ConfidenceEngine<InMemoryHistory> {
        let reader = InMemoryHistory::new()
            .with_lines(lines_with_points(42, 39, &[25, 25, 25, 25, 25, 15, 15, 15, 15, 15]));
        ConfidenceEngine::new(reader, EngineSettings::default())
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let store = Arc::new(MemoryCacheStore::new(1 << 20));
        let metrics = Arc::new(CacheMetrics::new());
        let cache = ScoreCache::new(
            store.clone(),
            metrics.clone(),
            CacheTtls::default(),
            WindowPolicy::Strict,
        );
        let engine = engine();

        let first = cache
            .hit_rate(&engine, 42, StatCategory::Points, 20, TimePeriod::L10)
            .await
            .unwrap();
        assert!(store.has_key("hitrate:42:points:20:l10").await.unwrap());
        let second = cache
            .hit_rate(&engine, 42, StatCategory::Points, 20, TimePeriod::L10)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.average.to_string(), "20.0000");
        let s = metrics.snapshot();
        assert_eq!((s.hits, s.misses, s.errors), (1, 1, 0));
    }

    #[tokio::test]
    async fn broken_store_fails_open() {
        let metrics = Arc::new(CacheMetrics::new());
        let cache = ScoreCache::new(
            Arc::new(BrokenStore),
            metrics.clone(),
            CacheTtls::default(),
            WindowPolicy::Strict,
        );
        let summary = cache
            .hit_rate(&engine(), 42, StatCategory::Points, 20, TimePeriod::L10)
            .await
            .unwrap();
        assert_eq!(summary.hit_rate.to_string(), "50.0");
        // failed lookup and failed write
        assert_eq!(metrics.snapshot().errors, 2);
    }

    #[tokio::test]
    async fn invalid_requests_never_touch_the_store() {
        let metrics = Arc::new(CacheMetrics::new());
        let cache = ScoreCache::new(
            Arc::new(BrokenStore),
            metrics.clone(),
            CacheTtls::default(),
            WindowPolicy::Strict,
        );
        let err = cache
            .hit_rate(&engine(), 42, StatCategory::All, 20, TimePeriod::L10)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert_eq!(metrics.snapshot().errors, 0);
    }

    #[tokio::test]
    async fn engines_on_another_policy_bypass_the_store() {
        let store = Arc::new(MemoryCacheStore::new(1 << 20));
        let metrics = Arc::new(CacheMetrics::new());
        let cache = ScoreCache::new(
            store.clone(),
            metrics.clone(),
            CacheTtls::default(),
            WindowPolicy::Strict,
        );
        // three games: enough for lenient L10, not for strict
        let reader = InMemoryHistory::new().with_lines(lines_with_points(42, 39, &[25, 25, 25]));
        let strict = ConfidenceEngine::new(reader.clone(), EngineSettings::default());
        let lenient = ConfidenceEngine::new(
            reader,
            EngineSettings {
                window_policy: WindowPolicy::Lenient,
                ..EngineSettings::default()
            },
        );

        let s = cache
            .hit_rate(&strict, 42, StatCategory::Points, 20, TimePeriod::L10)
            .await
            .unwrap();
        assert!(!s.sufficient_data);
        let l = cache
            .hit_rate(&lenient, 42, StatCategory::Points, 20, TimePeriod::L10)
            .await
            .unwrap();
        assert_eq!(
            l,
            lenient.calculate_hit_rate(42, StatCategory::Points, 20, TimePeriod::L10).unwrap()
        );
        assert!(l.sufficient_data);

        assert_eq!(store.health().await.unwrap().key_count, 1);
        let m = metrics.snapshot();
        assert_eq!((m.hits, m.misses, m.errors), (0, 1, 0));
    }

    #[tokio::test]
    async fn invalidate_player_drops_only_that_player() {
        let store = Arc::new(MemoryCacheStore::new(1 << 20));
        let cache = ScoreCache::new(
            store.clone(),
            Arc::new(CacheMetrics::new()),
            CacheTtls::default(),
            WindowPolicy::Strict,
        );
        let hour = Duration::from_secs(3600);
        for key in [
            "hitrate:42:points:20:l10",
            "player_stats:42:all:l5",
            "recent_games:42",
            "hitrate:420:points:20:l10",
            "recent_games:420",
        ] {
            store.set_with_ttl(key, "{}".into(), hour).await.unwrap();
        }
        assert_eq!(cache.invalidate_player(42).await.unwrap(), 3);
        assert!(store.has_key("recent_games:420").await.unwrap());
        assert_eq!(store.health().await.unwrap().key_count, 2);
    }
}
