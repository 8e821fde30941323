//! Infinite feed: deduplicated state plus the loader that fills it.

mod config;
mod loader;
mod scroll;
mod state;

pub use config::FeedConfig;
pub use loader::{FeedEvent, FeedLoader, FeedOrigin};
pub use scroll::{ScrollTrigger, ScrollViewport};
pub use state::FeedState;
