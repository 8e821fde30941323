use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::payload::parse_page;
use super::DiscoveryError;
use crate::app::Result;
use crate::domain::{FilterParams, ResourceDescriptor, UrlTemplates};

pub const DEFAULT_API_BASE_URL: &str = "https://backiee.com/api/wallpaper/list.php";
pub const DEFAULT_PAGE_SIZE: u32 = 30;

#[async_trait]
pub trait PageSource {
    /// Fetch one page (1-based) of resources matching `filter`.
    ///
    /// `Ok(vec![])` means the source answered with nothing. Transport,
    /// status and payload problems are `SourceUnavailable`.
    async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
        filter: &FilterParams,
    ) -> std::result::Result<Vec<ResourceDescriptor>, DiscoveryError>;
}

/// Client for the public paging API.
pub struct PagedApiSource {
    client: Client,
    base_url: Url,
    templates: UrlTemplates,
    timeout: Duration,
}

impl PagedApiSource {
    pub fn new(client: Client, base_url: &str, templates: UrlTemplates) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            templates,
            timeout: Duration::from_secs(10),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn page_url(&self, page: u32, page_size: u32, filter: &FilterParams) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("action", "paging_list")
            .append_pair("list_type", filter.sort.as_str())
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string())
            .append_pair("category", &filter.category)
            .append_pair("is_ai", filter.ai.as_str());
        url
    }
}

#[async_trait]
impl PageSource for PagedApiSource {
    async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
        filter: &FilterParams,
    ) -> std::result::Result<Vec<ResourceDescriptor>, DiscoveryError> {
        let url = self.page_url(page, page_size, filter);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DiscoveryError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Paging API returned HTTP {} for page {}", status, page);
            return Err(DiscoveryError::SourceUnavailable(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DiscoveryError::SourceUnavailable(e.to_string()))?;

        let items = parse_page(&body, &self.templates)?;
        debug!("Page {} returned {} items", page, items.len());
        Ok(items)
    }
}
