//! Score cache: deterministic keys, a TTL store, hit/miss metrics, the
//! read-through memo and the scheduled tiered warmer.

pub mod keys;
pub mod memo;
pub mod metrics;
pub mod schedule;
pub mod store;
pub mod warmer;

pub use keys::{CacheDomain, CacheTtls};
pub use memo::ScoreCache;
pub use metrics::{CacheMetrics, MetricsSink, MetricsSnapshot};
pub use schedule::{next_warm_at, parse_warm_time, spawn_daily_warming};
pub use store::{CacheStore, MemoryCacheStore, StoreHealth};
pub use warmer::{CacheWarmer, LastWarmReport, WarmOutcome, WarmReport, WarmSettings, WarmTier};
