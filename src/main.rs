use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use propscore::cache::{
    spawn_daily_warming, CacheMetrics, CacheStore, CacheWarmer, MemoryCacheStore, MetricsSink,
};
use propscore::clock::{Clock, RegionClock};
use propscore::config::Config;
use propscore::db::Database;
use propscore::monitor::{self, AppState};
use propscore::scoring::ConfidenceEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let settings = config.engine_settings();
    info!(
        "Scoring with {} strategy, {:?} window policy",
        settings.strategy.as_str(),
        settings.window_policy
    );
    let engine = Arc::new(ConfidenceEngine::new(db, settings));

    let clock: Arc<dyn Clock> = Arc::new(RegionClock::new(config.utc_offset()?));
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(config.cache_capacity_bytes));
    let metrics: Arc<dyn MetricsSink> = Arc::new(CacheMetrics::new());

    let warmer = Arc::new(CacheWarmer::new(
        engine,
        store.clone(),
        metrics.clone(),
        clock.clone(),
        config.cache_ttls(),
        config.warm_settings(),
    ));

    if config.warm_on_start {
        let report = warmer.run().await;
        info!("Startup warming: {:?}", report.outcome);
    }
    spawn_daily_warming(warmer.clone(), clock, config.warm_time()?);

    let app = monitor::router(AppState {
        store,
        metrics,
        last_warm: warmer.last_report(),
    });
    let addr: SocketAddr = config.monitor_addr.parse()?;
    info!("Monitor listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
