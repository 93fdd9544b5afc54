use dotenvy::dotenv;
use eyre::Result;
use serde::Deserialize;
use std::env;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub upstream_url: String, // dashboard dataset endpoint
    pub db_path: String,
    pub port: u16,
    pub refresh_secs: u64,
    pub cache_ttl_secs: u64,
    pub admission_tick_ms: u64,
    pub pulse_ms: u64,
    pub recent_window_days: i64,
    pub animate: bool,
    pub speed_hours: f64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // load from .env file when present

    // Upstream dashboard dataset (vouchers + transfers + reports + pools)
    let upstream_url = env::var("UPSTREAM_URL")
        .or_else(|_| env::var("DATA_API_URL")) // alias support
        .unwrap_or_else(|_| "http://localhost:5000/api/v1/dashboard".to_string());

    // SQLite snapshot cache path (default: voucher-graph.db)
    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "voucher-graph.db".to_string());

    let cfg = Config {
        upstream_url,
        db_path,
        port: env_or("PORT", 8080),
        refresh_secs: env_or("REFRESH_SECS", 60),
        cache_ttl_secs: env_or("CACHE_TTL_SECS", 300),
        admission_tick_ms: env_or("ADMISSION_TICK_MS", 30),
        pulse_ms: env_or("PULSE_MS", 1000),
        recent_window_days: env_or("RECENT_WINDOW_DAYS", 30),
        animate: env_or("ANIMATE", true),
        speed_hours: env_or("SPEED_HOURS", 24.0),
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
