use crate::cache::TtlCache;
use crate::config::Config;
use crate::db;
use crate::fetch::{self, DashboardData};
use crate::view::Dashboard;
use eyre::Result;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Keep the dashboard fed: load a snapshot at startup (falling back to the
/// local SQLite cache when the upstream is down), then refresh on a timer.
pub async fn run(cfg: Config, dash: Arc<Dashboard>, conn: Arc<Mutex<Connection>>) -> Result<()> {
    let mut cache: TtlCache<DashboardData> =
        TtlCache::new(Duration::from_secs(cfg.cache_ttl_secs));
    let mut retry_delay = 10; // retry backoff in seconds

    info!("Refresher started (every {}s, TTL {}s)", cfg.refresh_secs, cfg.cache_ttl_secs);

    // ---------------------------
    // One-time load at startup
    // ---------------------------
    match fetch::fetch_dashboard_data(&cfg.upstream_url).await {
        Ok(data) => {
            persist(&conn, &data);
            apply(&dash, &data);
            cache.set(data);
        }
        Err(e) => {
            warn!("Initial fetch failed: {:?}. Falling back to local snapshot", e);
            let loaded = {
                let db = conn.lock().unwrap();
                db::load_snapshot(&db)
            };
            match loaded {
                Ok((vouchers, transfers)) if !transfers.is_empty() => {
                    info!("Serving cached snapshot: {} transfers", transfers.len());
                    dash.set_data(vouchers, transfers, Vec::new(), Vec::new());
                }
                Ok(_) => warn!("Local snapshot is empty, waiting for the upstream"),
                Err(e) => error!("Loading local snapshot failed: {:?}", e),
            }
        }
    }

    // ---------------------------
    // Periodic refresh
    // ---------------------------
    loop {
        sleep(Duration::from_secs(cfg.refresh_secs)).await;

        if cache.get().is_some() {
            debug!("Snapshot still fresh, skipping upstream fetch");
            continue;
        }

        match fetch::fetch_dashboard_data(&cfg.upstream_url).await {
            Ok(data) => {
                retry_delay = 10; // reset after success
                persist(&conn, &data);
                apply(&dash, &data);
                cache.set(data);
            }
            Err(e) => {
                warn!("Refresh failed: {:?}", e);
                sleep(Duration::from_secs(retry_delay)).await;
                retry_delay = (retry_delay * 2).min(120);
            }
        }
    }
}

fn persist(conn: &Arc<Mutex<Connection>>, data: &DashboardData) {
    let mut db = conn.lock().unwrap();
    if let Err(e) = db::replace_snapshot(&mut db, &data.vouchers, &data.transactions) {
        error!("Persisting snapshot failed: {:?}", e);
    }
}

fn apply(dash: &Arc<Dashboard>, data: &DashboardData) {
    dash.set_data(
        data.vouchers.clone(),
        data.transactions.clone(),
        data.field_reports.clone(),
        data.pools.clone(),
    );
}
