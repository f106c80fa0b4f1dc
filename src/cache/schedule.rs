//! Daily warming trigger in the operating region's local time.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use super::warmer::CacheWarmer;
use crate::clock::Clock;
use crate::db::GameHistoryReader;

/// Parse `HH:MM`.
pub fn parse_warm_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("warm time '{}' is not HH:MM", raw))
}

/// First `at` strictly after `now`, on `now`'s offset.
pub fn next_warm_at(now: DateTime<FixedOffset>, at: NaiveTime) -> DateTime<FixedOffset> {
    let offset = *now.offset();
    let mut candidate = now.date_naive().and_time(at);
    if candidate <= now.naive_local() {
        candidate += ChronoDuration::days(1);
    }
    offset
        .from_local_datetime(&candidate)
        .single()
        .unwrap_or(now + ChronoDuration::days(1))
}

/// Run the warmer once a day at `at`. Runs never overlap: the next trigger
/// is computed only after the previous run has returned.
pub fn spawn_daily_warming<R>(
    warmer: Arc<CacheWarmer<R>>,
    clock: Arc<dyn Clock>,
    at: NaiveTime,
) -> JoinHandle<()>
where
    R: GameHistoryReader + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = clock.now();
            let next = next_warm_at(now, at);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!("Next cache warming at {} (in {:?})", next, wait);
            tokio::time::sleep(wait).await;
            warmer.run().await;
        }
    })
}
