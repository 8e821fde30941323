//! Resource discovery strategies and the guards around them.
//!
//! # Architecture
//!
//! ```text
//!                 ┌─ PagedApiSource ─┐   (gated by its CircuitBreaker)
//! DiscoveryPipeline                  ├─> items, or FallbackCatalog
//!                 └─ IdSpaceScanner ─┘   (gated by its CircuitBreaker)
//! ```
//!
//! The pipeline tries the preferred strategy, then the other one, and
//! finally the fallback catalog, so a caller always gets something back.

mod breaker;
mod fallback;
mod payload;
mod paged;
mod pipeline;
mod scanner;
mod stride;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, Clock, ManualClock, SystemClock};
pub use fallback::{FallbackCatalog, DEFAULT_FALLBACK_URLS};
pub use paged::{PageSource, PagedApiSource, DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE};
pub use payload::{parse_page, LooseValue};
pub use pipeline::{
    CursorSnapshot, Discovery, DiscoveryPipeline, DiscoverySource, DiscoverySources,
    PipelineConfig,
};
pub use scanner::{IdSpaceScanner, ScanBatch, ScanReport, ScanStats, ScanVerdict, DEFAULT_BATCH_SIZE};
pub use stride::{StrideJump, StridePolicy, EXHAUSTED_WINDOW_JUMP, MISS_STREAK_JUMP};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a discovery attempt produced nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Probe timed out: {0}")]
    ProbeTimeout(String),

    #[error("Probe failed: {0}")]
    ProbeTransient(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No new results")]
    EmptyTerminal,

    #[error("Circuit open until {0}")]
    CircuitOpen(DateTime<Utc>),

    #[error("Fallback catalog is empty")]
    CatalogExhausted,

    #[error("Discovery cancelled")]
    Cancelled,
}

impl DiscoveryError {
    /// Whether this outcome should count against the strategy's breaker.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            DiscoveryError::ProbeTimeout(_)
                | DiscoveryError::ProbeTransient(_)
                | DiscoveryError::SourceUnavailable(_)
        )
    }
}

/// A way of finding new resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    PagedApi,
    IdScan,
}

impl Strategy {
    pub fn alternate(&self) -> Self {
        match self {
            Strategy::PagedApi => Strategy::IdScan,
            Strategy::IdScan => Strategy::PagedApi,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::PagedApi => f.write_str("paged API"),
            Strategy::IdScan => f.write_str("ID scan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        assert!(DiscoveryError::SourceUnavailable("503".into()).counts_as_failure());
        assert!(DiscoveryError::ProbeTimeout("x".into()).counts_as_failure());
        assert!(!DiscoveryError::EmptyTerminal.counts_as_failure());
        assert!(!DiscoveryError::Cancelled.counts_as_failure());
        assert!(!DiscoveryError::CircuitOpen(Utc::now()).counts_as_failure());
    }

    #[test]
    fn test_strategy_alternate() {
        assert_eq!(Strategy::PagedApi.alternate(), Strategy::IdScan);
        assert_eq!(Strategy::IdScan.alternate(), Strategy::PagedApi);
    }
}
