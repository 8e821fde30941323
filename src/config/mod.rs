//! Configuration management for wallfeed.
//!
//! Configuration is read from `~/.config/wallfeed/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod sources;

pub use sources::{ApiConfig, FallbackConfig, ProbeConfig, ScannerConfig};

use crate::discovery::BreakerConfig;
use crate::domain::FilterParams;
use crate::feed::FeedConfig;
use crate::scraper::ScraperConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    pub api: ApiConfig,
    pub scanner: ScannerConfig,
    pub breaker: BreakerConfig,
    pub feed: FeedConfig,
    pub scraper: ScraperConfig,
    pub fallback: FallbackConfig,
    pub filter: FilterParams,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, creating a commented default there if missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::create_default_config(path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/wallfeed/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("wallfeed").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# wallfeed configuration
#
# Intervals accept "30s", "15m", "1h", "1d" or a plain number of seconds.

[probe]
# Hard timeout for one existence check (seconds)
timeout_secs = 10

[api]
base_url = "https://backiee.com/api/wallpaper/list.php"
page_size = 30
timeout_secs = 10

[scanner]
# IDs probed per batch, and how many probes may run at once
batch_size = 20
max_concurrency = 20

# Starting ID when the paging API has not reported one yet
start_id = 200000

# URL patterns, {id} is replaced by the numeric id
thumbnail_template = "https://backiee.com/static/wallpapers/560x315/{id}.jpg"
full_template = "https://backiee.com/static/wallpapers/wide/{id}.jpg"

# Jump used when a window has nothing left to probe
exhausted_jump = 10000

# Jump used after this many misses in a row
miss_streak_threshold = 50
miss_streak_jump = 5000

# Restart point once a jump would pass zero
reset_sentinel = 200000

max_attempted = 100000

[breaker]
# Consecutive failures before a source is suspended
failure_threshold = 5

# How long a suspended source stays suspended (seconds)
cooldown_secs = 900

[feed]
# paged_api or id_scan
preferred_strategy = "paged_api"

# Background prefetching
background_concurrency = 2
prefetch_chain_limit = 2
prefetch_after_load = true
prefetch_delay_ms = 300

# Load more once this fraction of the content has been scrolled past
scroll_threshold = 0.7
scroll_debounce_ms = 300
scroll_save_interval_ms = 2000

[scraper]
interval = "1h"
run_on_start = true
pages_per_run = 3
request_delay_ms = 1000
categories = ["all"]
restart_each_run = true
strategy = "paged_api"
# Published IDs kept for de-duplication
max_remembered = 10000

[filter]
# latest, popularity or downloads
sort = "latest"
category = "all"
# "all", "0" (exclude AI-generated) or "1" (only AI-generated)
ai = "all"

[fallback]
# Served when every live source is unavailable, a few at a time
per_call = 5
urls = [
    "https://wallpapercave.com/wp/wp2555030.jpg",
    "https://wallpaperaccess.com/full/51363.jpg",
    "https://images.pexels.com/photos/1366919/pexels-photo-1366919.jpeg",
    "https://wallpapercave.com/wp/wp4676582.jpg",
    "https://images.pexels.com/photos/1242348/pexels-photo-1242348.jpeg",
    "https://wallpapercave.com/wp/wp2581576.jpg",
    "https://images.pexels.com/photos/733745/pexels-photo-733745.jpeg",
    "https://wallpaperaccess.com/full/1091424.jpg",
    "https://images.pexels.com/photos/1323550/pexels-photo-1323550.jpeg",
    "https://wallpapercave.com/wp/wp7486693.jpg",
]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Strategy;
    use crate::domain::{AiFilter, SortMode};
    use tempfile::TempDir;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.scanner.batch_size, 20);
        assert_eq!(config.scanner.stride(), Config::default().scanner.stride());
        assert_eq!(config.breaker, BreakerConfig::default());
        assert_eq!(config.feed.preferred_strategy, Strategy::PagedApi);
        assert_eq!(config.scraper.interval, "1h");
        assert_eq!(config.scraper.max_remembered, 10_000);
        assert_eq!(config.fallback.urls, FallbackConfig::default().urls);
        assert_eq!(config.fallback.per_call, 5);
        assert_eq!(config.filter, FilterParams::default());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[feed]
preferred_strategy = "id_scan"

[filter]
sort = "popularity"
ai = "0"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        // Custom values
        assert_eq!(config.feed.preferred_strategy, Strategy::IdScan);
        assert_eq!(config.filter.sort, SortMode::Popularity);
        assert_eq!(config.filter.ai, AiFilter::ExcludeAi);
        // Default values
        assert_eq!(config.feed.background_concurrency, 2);
        assert_eq!(config.filter.category, "all");
        assert_eq!(config.api.page_size, 30);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");

        assert_eq!(config.probe.timeout_secs, 10);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.scraper.pages_per_run, 3);
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallfeed").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.scanner.start_id, 200_000);

        // A second load parses the file that was just written.
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.scanner.start_id, 200_000);
    }

    #[test]
    fn test_invalid_config_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scanner]\nbatch_size = \"many\"\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
