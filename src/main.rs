mod aggregator;
mod api;
mod cache;
mod config;
mod db;
mod fetch;
mod filter;
mod models;
mod physics;
mod pulse;
mod refresher;
mod scheduler;
mod store;
mod timeline;
mod view;

use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};
use view::{Dashboard, ViewSettings};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Voucher graph service starting...");

    // Load configuration
    let cfg = config::load()?;
    info!("  Upstream: {}", cfg.upstream_url);
    info!("  DB Path: {}", cfg.db_path);
    info!("  Port: {}", cfg.port);
    info!("  Refresh: every {}s (TTL {}s)", cfg.refresh_secs, cfg.cache_ttl_secs);
    info!("  Admission tick: {}ms, animate: {}", cfg.admission_tick_ms, cfg.animate);

    // Run DB migrations once at startup
    {
        let conn = db::connect(&cfg.db_path)?;
        db::run_migrations(&conn)?;
    }

    // Shared state
    let shared_conn = Arc::new(Mutex::new(db::connect(&cfg.db_path)?));
    let dash = Arc::new(Dashboard::new(ViewSettings::from(&cfg)));

    // Background pumps: admission drain, playback cursor, physics debounce
    tokio::spawn(view::run_admission_pump(Arc::clone(&dash)));
    tokio::spawn(view::run_timeline_pump(Arc::clone(&dash)));
    tokio::spawn(view::run_physics_pump(Arc::clone(&dash)));

    // Spawn API task
    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        let dash = Arc::clone(&dash);
        async move { api::serve(cfg, dash).await }
    });

    // Spawn refresher task
    let refresher_handle = tokio::spawn({
        let cfg = cfg.clone();
        let dash = Arc::clone(&dash);
        let conn = Arc::clone(&shared_conn);
        async move { refresher::run(cfg, dash, conn).await }
    });

    // Graceful shutdown
    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        res = refresher_handle => match res {
            Ok(Ok(_)) => info!("Refresher exited cleanly"),
            Ok(Err(e)) => error!("Refresher error: {:?}", e),
            Err(e) => error!("Refresher task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Voucher graph service stopped.");
    Ok(())
}
