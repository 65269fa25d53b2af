//! Server configuration.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Server configuration for one venue deployment.
///
/// # Environment variables
///
/// All settings can be overridden through the environment:
///
/// | Variable | Default | Purpose |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/venue | Working directory (database, stations.json, logs) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | VENUE_ID | venue-local | Venue scope stamped on orders and events |
/// | TAX_RATE | 0.10 | Tax rate applied when totals are recomputed |
/// | STORE_POOL_SIZE | 64 | Bounded permit pool in front of the order store |
/// | STORE_WAIT_MS | 2000 | Bounded wait before store exhaustion surfaces as busy |
/// | EFFECTS_QUEUE_CAPACITY | 1024 | Side-effect queue length |
/// | DISPATCH_CHANNEL_CAPACITY | 256 | Per-subscriber event queue length |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/venue HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for the database, station config and logs
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Venue scope for orders and events
    pub venue_id: String,
    /// Tax rate used by the totals recomputation
    pub tax_rate: Decimal,
    /// Permit pool size in front of the order store
    pub store_pool_size: usize,
    /// Bounded wait for a store permit, milliseconds
    pub store_wait_ms: u64,
    /// Side-effect queue capacity
    pub effects_queue_capacity: usize,
    /// Per-subscriber dispatch queue capacity
    pub dispatch_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/venue".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            venue_id: std::env::var("VENUE_ID").unwrap_or_else(|_| "venue-local".into()),
            tax_rate: std::env::var("TAX_RATE")
                .ok()
                .and_then(|v| Decimal::from_str(&v).ok())
                .unwrap_or_else(|| Decimal::new(10, 2)),
            store_pool_size: env_parse("STORE_POOL_SIZE", 64),
            store_wait_ms: env_parse("STORE_WAIT_MS", 2000),
            effects_queue_capacity: env_parse("EFFECTS_QUEUE_CAPACITY", 1024),
            dispatch_channel_capacity: env_parse("DISPATCH_CHANNEL_CAPACITY", 256),
        }
    }

    pub fn db_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.work_dir).join("orders.redb")
    }

    pub fn stations_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.work_dir).join("stations.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
