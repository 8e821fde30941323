use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;

use crate::app::error::{Result, WallfeedError};
use crate::config::Config;
use crate::discovery::{
    CircuitBreaker, DiscoveryPipeline, DiscoverySources, FallbackCatalog, IdSpaceScanner,
    PagedApiSource, PipelineConfig,
};
use crate::feed::FeedLoader;
use crate::fetcher::{build_client, HttpProbe, Probe};
use crate::scraper::ScraperService;
use crate::settings::{FeedPreferences, FileSettings, MemorySettings, SettingsProvider};

/// Everything the commands need, built once from the configuration.
pub struct AppContext {
    pub config: Config,
    pub client: Client,
    pub sources: DiscoverySources,
    pub settings: Arc<dyn SettingsProvider + Send + Sync>,
}

impl AppContext {
    /// Build with preferences persisted under the data directory.
    pub fn new(config: Config) -> Result<Self> {
        let path = Self::default_settings_path()?;
        let settings = Arc::new(FileSettings::new(path, Self::default_preferences(&config)));
        Self::with_settings(config, settings)
    }

    /// Build with preferences kept in memory only.
    pub fn in_memory(config: Config) -> Result<Self> {
        let settings = Arc::new(MemorySettings::new(Self::default_preferences(&config)));
        Self::with_settings(config, settings)
    }

    pub fn with_settings(
        config: Config,
        settings: Arc<dyn SettingsProvider + Send + Sync>,
    ) -> Result<Self> {
        let client = build_client(&config.probe.user_agent, config.api.timeout())?;
        let templates = config.scanner.templates();

        let probe: Arc<dyn Probe + Send + Sync> = Arc::new(HttpProbe::with_timeout(
            client.clone(),
            config.probe.timeout(),
        ));
        let scanner = IdSpaceScanner::with_concurrency(
            probe,
            templates.clone(),
            config.scanner.max_concurrency,
        )
        .with_probe_timeout(config.probe.timeout());

        let pages = PagedApiSource::new(client.clone(), &config.api.base_url, templates)?
            .with_timeout(config.api.timeout());

        let sources = DiscoverySources {
            pages: Arc::new(pages),
            scanner: Arc::new(scanner),
            api_breaker: Arc::new(CircuitBreaker::new("paged API", config.breaker)),
            scan_breaker: Arc::new(CircuitBreaker::new("ID scan", config.breaker)),
            fallback: Arc::new(FallbackCatalog::from_urls(&config.fallback.urls)?),
        };

        Ok(Self {
            config,
            client,
            sources,
            settings,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            page_size: self.config.api.page_size,
            batch_size: self.config.scanner.batch_size,
            start_id: self.config.scanner.start_id,
            stride: self.config.scanner.stride(),
            fallback_count: self.config.fallback.per_call,
            max_attempted: self.config.scanner.max_attempted,
        }
    }

    /// A fresh pipeline with its own cursors, sharing breakers and sources.
    pub fn pipeline(&self) -> DiscoveryPipeline {
        DiscoveryPipeline::new(self.sources.clone(), self.pipeline_config())
    }

    pub fn feed_loader(&self) -> FeedLoader {
        FeedLoader::new(
            self.pipeline(),
            self.settings.clone(),
            self.config.feed.clone(),
        )
    }

    pub fn scraper_service(&self) -> Result<ScraperService> {
        let filter = self
            .settings
            .get()
            .map(|prefs| prefs.filter)
            .unwrap_or_else(|_| self.config.filter.clone());
        ScraperService::new(
            self.sources.clone(),
            self.pipeline_config(),
            self.config.scraper.clone(),
            filter,
        )
    }

    fn default_preferences(config: &Config) -> FeedPreferences {
        FeedPreferences {
            filter: config.filter.clone(),
            ..FeedPreferences::default()
        }
    }

    fn default_settings_path() -> Result<PathBuf> {
        FileSettings::default_path()
            .ok_or_else(|| WallfeedError::Settings("Could not find data directory".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackConfig;

    #[test]
    fn test_in_memory_context_wires_defaults() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        assert_eq!(ctx.sources.fallback.len(), 10);
        assert!(!ctx.sources.api_breaker.is_open());

        let pipeline = ctx.pipeline_config();
        assert_eq!(pipeline.batch_size, 20);
        assert_eq!(pipeline.page_size, 30);
        assert_eq!(pipeline.fallback_count, 5);
    }

    #[test]
    fn test_empty_fallback_list_is_rejected() {
        let config = Config {
            fallback: FallbackConfig {
                urls: Vec::new(),
                ..FallbackConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            AppContext::in_memory(config),
            Err(WallfeedError::CatalogExhausted)
        ));
    }

    #[test]
    fn test_bad_api_url_is_rejected() {
        let mut config = Config::default();
        config.api.base_url = "not a url".into();
        assert!(matches!(
            AppContext::in_memory(config),
            Err(WallfeedError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_scraper_service_uses_configured_interval() {
        let mut config = Config::default();
        config.scraper.interval = "15m".into();
        let ctx = AppContext::in_memory(config).unwrap();
        let service = ctx.scraper_service().unwrap();
        assert_eq!(service.period(), std::time::Duration::from_secs(900));
    }
}
