//! # Wallfeed
//!
//! Wallpaper discovery that keeps an infinite feed filled even when the
//! upstream catalog misbehaves.
//!
//! ## Architecture
//!
//! ```text
//! PagedApiSource ─┐
//!                 ├─> DiscoveryPipeline ─> FeedLoader ─> FeedState
//! IdSpaceScanner ─┘        │                    │
//!        FallbackCatalog ──┘                    └─> broadcast FeedEvent
//!
//! ScraperService ─(interval)─> DiscoveryPipeline ─> broadcast ScrapeEvent
//! ```
//!
//! Each source sits behind its own circuit breaker. When both are down
//! the pipeline serves items from the fallback catalog instead of failing.
//!
//! ## Quick Start
//!
//! ```bash
//! # Initial feed plus two scroll-triggered pages
//! wallfeed feed --more 2
//!
//! # Probe 50 IDs downward from 210000
//! wallfeed scan --cursor 210000 --batch 50
//!
//! # Raw page from the listing API
//! wallfeed page --page 3 --sort downloads --ai 0
//!
//! # Background scraper, every 30 minutes
//! wallfeed watch --interval 30m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the HTTP
/// client, both discovery sources, their breakers and the settings store.
pub mod app;

/// Command-line interface using clap.
///
/// - `feed [--more N]` - Load the feed and print it
/// - `scan [--cursor ID] [--batch N]` - Probe one batch of IDs
/// - `page [--page N] [--category C] [--ai F] [--sort S]` - Fetch one API page
/// - `watch [--interval I] [--no-initial]` - Run the periodic scraper
pub mod cli;

/// Configuration loaded from `~/.config/wallfeed/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`ResourceDescriptor`](domain::ResourceDescriptor): one wallpaper
/// - [`FilterParams`](domain::FilterParams): sort, category and AI filter
/// - [`DiscoveryCursor`](domain::DiscoveryCursor): resumable position in both sources
pub mod domain;

/// Discovery strategies, circuit breakers, stride jumps and the fallback catalog.
pub mod discovery;

/// Infinite feed state and the loader driving it.
pub mod feed;

/// HTTP existence probes.
///
/// - [`Probe`](fetcher::Probe): Async trait for URL existence checks
/// - [`HttpProbe`](fetcher::HttpProbe): reqwest-based implementation
pub mod fetcher;

/// Periodic background scraping of new resources.
pub mod scraper;

/// Persisted feed preferences (scroll position, tile size, filter).
pub mod settings;

#[cfg(test)]
mod testing;
