//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::logic::activity::{default_watch_paths, AggregatorConfig, WatchConfig};
use crate::logic::geo::GeoConfig;
use crate::logic::risk::RiskRules;
use crate::logic::session::SessionConfig;
use crate::logic::threat::DedupPolicy;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file. In-memory store when unset.
    pub database_path: Option<PathBuf>,

    pub geo: GeoConfig,
    pub session: SessionConfig,
    pub aggregator: AggregatorConfig,
    pub watch: WatchConfig,
    pub dedup: DedupPolicy,
    pub rules: RiskRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            geo: GeoConfig::default(),
            session: SessionConfig::default(),
            aggregator: AggregatorConfig::default(),
            watch: WatchConfig::default(),
            dedup: DedupPolicy::default(),
            rules: RiskRules::default(),
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let geo_defaults = GeoConfig::default();
        let session_defaults = SessionConfig::default();
        let bulk_defaults = AggregatorConfig::default();
        let rules_defaults = RiskRules::default();

        Self {
            database_path: env::var("DATABASE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),

            geo: GeoConfig {
                api_url: env::var("IP_API_URL").unwrap_or(geo_defaults.api_url),
                timeout_seconds: parsed("GEO_TIMEOUT_SECONDS", geo_defaults.timeout_seconds),
                cache_ttl_seconds: parsed("GEO_CACHE_TTL_SECONDS", geo_defaults.cache_ttl_seconds),
            },

            session: SessionConfig {
                timeout_minutes: parsed("SESSION_TIMEOUT_MINUTES", session_defaults.timeout_minutes),
                check_interval_seconds: parsed(
                    "SESSION_CHECK_INTERVAL_SECONDS",
                    session_defaults.check_interval_seconds,
                ),
            },

            aggregator: AggregatorConfig {
                scan_interval_seconds: parsed("FILE_SCAN_INTERVAL_SECONDS", bulk_defaults.scan_interval_seconds),
                window_minutes: parsed("BULK_WINDOW_MINUTES", bulk_defaults.window_minutes),
                min_files: parsed("BULK_MIN_FILES", bulk_defaults.min_files),
                min_size_mb: parsed("BULK_MIN_SIZE_MB", bulk_defaults.min_size_mb),
            },

            watch: WatchConfig {
                enabled: parsed("FILE_WATCH_ENABLED", true),
                paths: list("FILE_WATCH_PATHS")
                    .map(|paths| paths.into_iter().map(PathBuf::from).collect())
                    .unwrap_or_else(default_watch_paths),
                stability_ms: parsed("FILE_WATCH_STABILITY_MS", 2000),
                poll_ms: 100,
            },

            dedup: DedupPolicy::uniform(parsed("THREAT_DEDUP_MINUTES", 30)),

            rules: RiskRules {
                utc_offset_minutes: parsed("RISK_UTC_OFFSET_MINUTES", rules_defaults.utc_offset_minutes),
                high_risk_countries: list("HIGH_RISK_COUNTRIES").unwrap_or(rules_defaults.high_risk_countries),
            },
        }
    }
}
