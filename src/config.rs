//! Application-level configuration loading, including the player color palette.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RACEPARTY_BACK_CONFIG_PATH";
/// Fallback color returned when the palette is exhausted.
pub const FALLBACK_COLOR: &str = "#94a3b8";
/// Upper bound for private party capacity.
pub const MAX_PRIVATE_PARTY_SIZE: usize = 10;

const DEFAULT_PUBLIC_PARTY_SIZE: usize = 4;
const DEFAULT_RECONNECT_GRACE_SECS: u64 = 30;
const DEFAULT_COUNTDOWN_FROM: u8 = 3;
const DEFAULT_COUNTDOWN_TICK_MS: u64 = 1_000;
const DEFAULT_PARTY_TTL_SECS: u64 = 3_600;
const DEFAULT_EVICTION_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_MATCH_RETENTION_SECS: u64 = 60;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    palette: Vec<String>,
    /// Capacity of auto-matched public parties.
    pub public_party_size: usize,
    /// Capacity of invite-code private parties.
    pub private_party_size: usize,
    /// How long a disconnected identity keeps its party slot.
    pub reconnect_grace: Duration,
    /// First number announced by the pre-match countdown.
    pub countdown_from: u8,
    /// Delay between two countdown announcements.
    pub countdown_tick: Duration,
    /// Lifetime of a party record before the store expires it.
    pub party_ttl: Duration,
    /// Upper bound spent waiting for a replaced connection to close.
    pub eviction_timeout: Duration,
    /// How long a settled match stays queryable.
    pub match_retention: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        colors = app_config.palette.len(),
                        "loaded lobby configuration"
                    );
                    app_config
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

    /// Return the lowest-index palette color that is not already listed in `used`.
    ///
    /// When every palette entry is taken we hand out [`FALLBACK_COLOR`] so callers always
    /// receive a value.
    pub fn first_unused_color(&self, used: &[&str]) -> String {
        self.palette
            .iter()
            .find(|candidate| used.iter().all(|existing| existing != candidate))
            .cloned()
            .unwrap_or_else(|| FALLBACK_COLOR.to_string())
    }

    /// Ordered palette handed out to party members.
    pub fn palette(&self) -> &[String] {
        &self.palette
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            public_party_size: DEFAULT_PUBLIC_PARTY_SIZE,
            private_party_size: MAX_PRIVATE_PARTY_SIZE,
            reconnect_grace: Duration::from_secs(DEFAULT_RECONNECT_GRACE_SECS),
            countdown_from: DEFAULT_COUNTDOWN_FROM,
            countdown_tick: Duration::from_millis(DEFAULT_COUNTDOWN_TICK_MS),
            party_ttl: Duration::from_secs(DEFAULT_PARTY_TTL_SECS),
            eviction_timeout: Duration::from_millis(DEFAULT_EVICTION_TIMEOUT_MS),
            match_retention: Duration::from_secs(DEFAULT_MATCH_RETENTION_SECS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    palette: Option<Vec<String>>,
    #[serde(default)]
    public_party_size: Option<usize>,
    #[serde(default)]
    private_party_size: Option<usize>,
    #[serde(default)]
    reconnect_grace_secs: Option<u64>,
    #[serde(default)]
    countdown_from: Option<u8>,
    #[serde(default)]
    countdown_tick_ms: Option<u64>,
    #[serde(default)]
    party_ttl_secs: Option<u64>,
    #[serde(default)]
    eviction_timeout_ms: Option<u64>,
    #[serde(default)]
    match_retention_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let palette = value
            .palette
            .filter(|colors| !colors.is_empty())
            .unwrap_or(defaults.palette);

        Self {
            palette,
            public_party_size: value
                .public_party_size
                .unwrap_or(defaults.public_party_size)
                .max(1),
            private_party_size: value
                .private_party_size
                .unwrap_or(defaults.private_party_size)
                .clamp(1, MAX_PRIVATE_PARTY_SIZE),
            reconnect_grace: value
                .reconnect_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconnect_grace),
            countdown_from: value.countdown_from.unwrap_or(defaults.countdown_from),
            countdown_tick: value
                .countdown_tick_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.countdown_tick),
            party_ttl: value
                .party_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.party_ttl),
            eviction_timeout: value
                .eviction_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.eviction_timeout),
            match_retention: value
                .match_retention_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.match_retention),
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

/// Built-in palette shipped with the binary.
fn default_palette() -> Vec<String> {
    [
        "#ef4444", "#f97316", "#eab308", "#84cc16", "#10b981", "#06b6d4", "#3b82f6", "#8b5cf6",
        "#d946ef", "#f43f5e",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
