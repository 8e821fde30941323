use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::{StrideJump, StridePolicy, DEFAULT_API_BASE_URL, DEFAULT_FALLBACK_URLS};
use crate::domain::cursor::DEFAULT_MAX_ATTEMPTED;
use crate::domain::UrlTemplates;
use crate::fetcher::DEFAULT_USER_AGENT;

/// Existence-probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Hard per-probe timeout in seconds (default: 10)
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Paging API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: 30,
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// ID-space scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub batch_size: usize,
    pub max_concurrency: usize,
    /// First ID probed when the paging API has not seeded the cursor
    pub start_id: u64,
    pub thumbnail_template: String,
    pub full_template: String,
    pub exhausted_jump: u64,
    pub miss_streak_threshold: usize,
    pub miss_streak_jump: u64,
    /// Where the cursor restarts once a jump would pass zero
    pub reset_sentinel: u64,
    /// Attempted-ID memory before old entries are pruned
    pub max_attempted: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let templates = UrlTemplates::default();
        Self {
            batch_size: 20,
            max_concurrency: 20,
            start_id: 200_000,
            thumbnail_template: templates.thumbnail,
            full_template: templates.full,
            exhausted_jump: 10_000,
            miss_streak_threshold: 50,
            miss_streak_jump: 5_000,
            reset_sentinel: 200_000,
            max_attempted: DEFAULT_MAX_ATTEMPTED,
        }
    }
}

impl ScannerConfig {
    pub fn templates(&self) -> UrlTemplates {
        UrlTemplates {
            thumbnail: self.thumbnail_template.clone(),
            full: self.full_template.clone(),
        }
    }

    pub fn stride(&self) -> StridePolicy {
        StridePolicy {
            exhausted: StrideJump::new(self.exhausted_jump, self.reset_sentinel),
            miss_streak_threshold: self.miss_streak_threshold,
            miss_streak: StrideJump::new(self.miss_streak_jump, self.reset_sentinel),
        }
    }
}

/// Placeholder catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub urls: Vec<String>,
    /// Entries handed out per fallback call (default: 5)
    pub per_call: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            urls: DEFAULT_FALLBACK_URLS.iter().map(|s| s.to_string()).collect(),
            per_call: 5,
        }
    }
}
