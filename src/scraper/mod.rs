//! Periodic background discovery, independent of any open feed.
//!
//! # Architecture
//!
//! ```text
//! timer tick → try_run (skipped if busy) → DiscoveryPipeline (per category)
//!                                      → ScrapeEvent::NewResources
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use wallfeed::scraper::{ScraperConfig, ScraperService};
//!
//! let service = ScraperService::new(sources, pipeline_config, ScraperConfig::default(), filter)?;
//! let mut events = service.subscribe();
//! service.start();
//!
//! while let Ok(event) = events.recv().await {
//!     // ...
//! }
//! ```

mod config;
mod service;

pub use config::{format_interval, parse_interval, IntervalError, ScraperConfig};
pub use service::{ScrapeEvent, ScrapeReport, ScraperService};
