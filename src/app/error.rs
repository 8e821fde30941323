use thiserror::Error;

#[derive(Error, Debug)]
pub enum WallfeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] crate::discovery::DiscoveryError),

    #[error(transparent)]
    Interval(#[from] crate::scraper::IntervalError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Fallback catalog is empty")]
    CatalogExhausted,
}

pub type Result<T> = std::result::Result<T, WallfeedError>;
