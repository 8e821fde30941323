use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::fetcher::{Probe, ProbeOutcome};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// HEAD-request probe over the shared client.
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self::with_timeout(client, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeout(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let request = self.client.head(url).timeout(self.timeout).send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => ProbeOutcome::from_status(response.status()),
            Ok(Err(e)) => {
                tracing::debug!("Probe {} failed: {}", url, e);
                ProbeOutcome::TransientError
            }
            Err(_) => {
                tracing::debug!("Probe {} timed out after {:?}", url, self.timeout);
                ProbeOutcome::TransientError
            }
        }
    }
}
