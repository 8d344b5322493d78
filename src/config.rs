//! Application-level configuration loading for the cache tier, the
//! propagation stream, and the flush scheduler.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "IDLEFORGE_BACK_CONFIG_PATH";

const DEFAULT_CACHE_TTL_SECONDS: u64 = 3_600;
const DEFAULT_FLUSH_INTERVAL_SECONDS: u64 = 300;
const DEFAULT_STREAM_KEY: &str = "stream:game_saves";
const DEFAULT_CONSUMER_GROUP: &str = "game-save-consumers";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Valkey connection URL. `None` runs the server on in-memory backends
    /// (single instance, no crash recovery).
    pub valkey_url: Option<String>,
    /// Whether the cache tier starts enabled.
    pub cache_enabled: bool,
    /// TTL applied to cached sub-entity records. Zero disables expiry.
    pub cache_ttl_seconds: u64,
    /// Interval between scheduled flushes of pending cache writes.
    pub flush_interval_seconds: u64,
    /// Stream key carrying propagation events.
    pub stream_key: String,
    /// Consumer group shared by all server instances.
    pub consumer_group: String,
    /// Per-instance consumer name within the group.
    pub consumer_name: String,
    /// Token required by the admin surface. `None` disables admin routes.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to
    /// built-in defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            valkey_url: None,
            cache_enabled: true,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            flush_interval_seconds: DEFAULT_FLUSH_INTERVAL_SECONDS,
            stream_key: DEFAULT_STREAM_KEY.to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            consumer_name: default_consumer_name(),
            admin_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at
/// [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    valkey_url: Option<String>,
    cache_enabled: Option<bool>,
    cache_ttl_seconds: Option<u64>,
    flush_interval_seconds: Option<u64>,
    stream_key: Option<String>,
    consumer_group: Option<String>,
    consumer_name: Option<String>,
    admin_token: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            valkey_url: raw.valkey_url,
            cache_enabled: raw.cache_enabled.unwrap_or(defaults.cache_enabled),
            cache_ttl_seconds: raw.cache_ttl_seconds.unwrap_or(defaults.cache_ttl_seconds),
            flush_interval_seconds: raw
                .flush_interval_seconds
                .unwrap_or(defaults.flush_interval_seconds),
            stream_key: raw.stream_key.unwrap_or(defaults.stream_key),
            consumer_group: raw.consumer_group.unwrap_or(defaults.consumer_group),
            consumer_name: raw.consumer_name.unwrap_or(defaults.consumer_name),
            admin_token: raw.admin_token,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Stable fallback consumer name so a restarted instance lands back on its
/// own consumer slot and can reclaim entries it read but never acknowledged.
fn default_consumer_name() -> String {
    env::var("HOSTNAME")
        .ok()
        .filter(|host| !host.is_empty())
        .map(|host| format!("consumer-{host}"))
        .unwrap_or_else(|| "game-save-consumer".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_consumer_name_is_stable_across_restarts() {
        assert_eq!(default_consumer_name(), default_consumer_name());
    }
}
