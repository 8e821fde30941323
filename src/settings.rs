//! Persisted user preferences for the feed view.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::{Result, WallfeedError};
use crate::domain::FilterParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedPreferences {
    /// Last saved vertical scroll offset
    pub scroll_position: f64,
    /// Tile size used by the presentation layer
    pub item_width: f64,
    pub item_height: f64,
    pub filter: FilterParams,
}

impl Default for FeedPreferences {
    fn default() -> Self {
        Self {
            scroll_position: 0.0,
            item_width: 300.0,
            item_height: 180.0,
            filter: FilterParams::default(),
        }
    }
}

/// Read/write access to [`FeedPreferences`].
pub trait SettingsProvider {
    fn get(&self) -> Result<FeedPreferences>;

    /// Apply `change` to the stored preferences and persist the result.
    fn update(&self, change: &mut dyn FnMut(&mut FeedPreferences)) -> Result<FeedPreferences>;
}

/// Preferences that live only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    prefs: Mutex<FeedPreferences>,
}

impl MemorySettings {
    pub fn new(prefs: FeedPreferences) -> Self {
        Self {
            prefs: Mutex::new(prefs),
        }
    }
}

impl SettingsProvider for MemorySettings {
    fn get(&self) -> Result<FeedPreferences> {
        Ok(self
            .prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn update(&self, change: &mut dyn FnMut(&mut FeedPreferences)) -> Result<FeedPreferences> {
        let mut prefs = self.prefs.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut prefs);
        Ok(prefs.clone())
    }
}

/// Preferences stored as a TOML file.
///
/// A missing file reads as `defaults`. Writes go through a mutex so two
/// updates in one process never interleave.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    defaults: FeedPreferences,
    write_lock: Mutex<()>,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>, defaults: FeedPreferences) -> Self {
        Self {
            path: path.into(),
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    /// Default location: `<data dir>/wallfeed/settings.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("wallfeed").join("settings.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<FeedPreferences> {
        if !self.path.exists() {
            return Ok(self.defaults.clone());
        }
        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            WallfeedError::Settings(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }
}

impl SettingsProvider for FileSettings {
    fn get(&self) -> Result<FeedPreferences> {
        self.read()
    }

    fn update(&self, change: &mut dyn FnMut(&mut FeedPreferences)) -> Result<FeedPreferences> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut prefs = self.read()?;
        change(&mut prefs);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&prefs)
            .map_err(|e| WallfeedError::Settings(format!("Failed to serialize settings: {}", e)))?;
        fs::write(&self.path, content)?;
        debug!("Saved settings to {}", self.path.display());

        Ok(prefs)
    }
}
