//! Persistent application configuration model and defaults.

use std::path::{Path, PathBuf};

use log::{info, warn};

const APP_DIR_NAME: &str = "mediadiary";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "mediadiary.db";

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Artwork lookup preferences.
    pub artwork: ArtworkConfig,
    #[serde(default)]
    /// Local storage locations.
    pub storage: StorageConfig,
}

/// Artwork provider endpoints and request pacing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ArtworkConfig {
    /// Minimum gap between two outbound provider requests. `0` disables pacing.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_itunes_search_url")]
    pub itunes_search_url: String,
    #[serde(default = "default_deezer_api_url")]
    pub deezer_api_url: String,
    /// Edge length requested when rewriting iTunes thumbnail URLs.
    #[serde(default = "default_itunes_artwork_size_px")]
    pub itunes_artwork_size_px: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Local storage preferences.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct StorageConfig {
    /// SQLite database path. Empty means the platform data directory.
    #[serde(default)]
    pub database_path: String,
    /// Key under which the artwork cache blob is stored.
    #[serde(default = "default_artwork_cache_key")]
    pub artwork_cache_key: String,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: default_min_request_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            itunes_search_url: default_itunes_search_url(),
            deezer_api_url: default_deezer_api_url(),
            itunes_artwork_size_px: default_itunes_artwork_size_px(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: String::new(),
            artwork_cache_key: default_artwork_cache_key(),
        }
    }
}

impl StorageConfig {
    /// Resolves the configured database path, falling back to the platform data directory.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        let trimmed = self.database_path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
        dirs::data_dir().map(|path| path.join(APP_DIR_NAME).join(DATABASE_FILE_NAME))
    }
}

fn default_min_request_interval_ms() -> u64 {
    300
}

fn default_request_timeout_ms() -> u64 {
    7_000
}

fn default_itunes_search_url() -> String {
    "https://itunes.apple.com/search".to_string()
}

fn default_deezer_api_url() -> String {
    "https://api.deezer.com".to_string()
}

fn default_itunes_artwork_size_px() -> u32 {
    512
}

fn default_user_agent() -> String {
    format!("mediadiary/{}", env!("CARGO_PKG_VERSION"))
}

fn default_artwork_cache_key() -> String {
    "artwork_cache".to_string()
}

/// Default location of `config.toml` under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|path| path.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Clamps values that would make lookups misbehave.
pub fn sanitize_config(config: Config) -> Config {
    let defaults = ArtworkConfig::default();
    let artwork = config.artwork;
    let storage = config.storage;

    Config {
        artwork: ArtworkConfig {
            min_request_interval_ms: artwork.min_request_interval_ms.min(10_000),
            request_timeout_ms: artwork.request_timeout_ms.clamp(500, 60_000),
            itunes_search_url: non_empty_or(artwork.itunes_search_url, defaults.itunes_search_url),
            deezer_api_url: non_empty_or(
                artwork.deezer_api_url.trim_end_matches('/').to_string(),
                defaults.deezer_api_url,
            ),
            itunes_artwork_size_px: artwork.itunes_artwork_size_px.clamp(60, 3_000),
            user_agent: non_empty_or(artwork.user_agent, defaults.user_agent),
        },
        storage: StorageConfig {
            database_path: storage.database_path,
            artwork_cache_key: non_empty_or(
                storage.artwork_cache_key,
                default_artwork_cache_key(),
            ),
        },
    }
}

fn non_empty_or(value: String, fallback: String) -> String {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Loads `config.toml`, writing defaults first when the file does not exist.
///
/// An unreadable or unparseable file yields defaults; the error is logged.
pub fn load_or_create_config(path: &Path) -> Config {
    if !path.exists() {
        let default_config = Config::default();
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            if let Err(error) = std::fs::create_dir_all(parent) {
                warn!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                );
            }
        }
        match toml::to_string(&default_config) {
            Ok(serialized) => {
                if let Err(error) = std::fs::write(path, serialized) {
                    warn!("Failed to write default config {}: {}", path.display(), error);
                }
            }
            Err(error) => warn!("Failed to serialize default config: {}", error),
        }
        return default_config;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            warn!("Failed to read config {}: {}", path.display(), error);
            return Config::default();
        }
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => sanitize_config(config),
        Err(error) => {
            warn!(
                "Failed to parse config {}; using defaults: {}",
                path.display(),
                error
            );
            Config::default()
        }
    }
}
