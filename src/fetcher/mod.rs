pub mod http_probe;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::app::Result;

pub use http_probe::HttpProbe;

pub const DEFAULT_USER_AGENT: &str = concat!("wallfeed/", env!("CARGO_PKG_VERSION"));

/// Result of an existence check against one candidate URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx
    Exists,
    /// 4xx
    NotFound,
    /// Network error, timeout, 5xx or anything else unexpected
    TransientError,
}

impl ProbeOutcome {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            ProbeOutcome::Exists
        } else if status.is_client_error() {
            ProbeOutcome::NotFound
        } else {
            ProbeOutcome::TransientError
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeOutcome::TransientError)
    }
}

#[async_trait]
pub trait Probe {
    /// Check whether `url` exists without transferring its body.
    ///
    /// Implementations must not stay pending forever; a probe that does not
    /// finish within its timeout resolves to `TransientError`.
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Build the HTTP client shared by every component.
///
/// `reqwest::Client` is reference counted, so clones share one connection pool.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}
