use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::Strategy;

/// Feed loading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Strategy tried first by load-more (paged_api or id_scan)
    pub preferred_strategy: Strategy,
    /// Ceiling on concurrently running background prefetches
    pub background_concurrency: usize,
    /// How many times a prefetch may schedule another one
    pub prefetch_chain_limit: usize,
    /// Start a prefetch after each successful load
    pub prefetch_after_load: bool,
    pub prefetch_delay_ms: u64,
    /// Fraction of content scrolled past before loading more
    pub scroll_threshold: f64,
    pub scroll_debounce_ms: u64,
    pub scroll_save_interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            preferred_strategy: Strategy::PagedApi,
            background_concurrency: 2,
            prefetch_chain_limit: 2,
            prefetch_after_load: true,
            prefetch_delay_ms: 300,
            scroll_threshold: 0.7,
            scroll_debounce_ms: 300,
            scroll_save_interval_ms: 2000,
        }
    }
}

impl FeedConfig {
    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn scroll_save_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_save_interval_ms)
    }
}
