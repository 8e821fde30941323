use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    CircuitBreaker, DiscoveryError, FallbackCatalog, IdSpaceScanner, PageSource, ScanVerdict,
    Strategy, StridePolicy, DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE,
};
use crate::domain::cursor::DEFAULT_MAX_ATTEMPTED;
use crate::domain::{DiscoveryCursor, FilterParams, ResourceDescriptor};

/// Shared collaborators. Cloning shares the breakers and sources.
#[derive(Clone)]
pub struct DiscoverySources {
    pub pages: Arc<dyn PageSource + Send + Sync>,
    pub scanner: Arc<IdSpaceScanner>,
    pub api_breaker: Arc<CircuitBreaker>,
    pub scan_breaker: Arc<CircuitBreaker>,
    pub fallback: Arc<FallbackCatalog>,
}

impl DiscoverySources {
    fn breaker(&self, strategy: Strategy) -> &CircuitBreaker {
        match strategy {
            Strategy::PagedApi => &self.api_breaker,
            Strategy::IdScan => &self.scan_breaker,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub page_size: u32,
    pub batch_size: usize,
    /// Where the ID cursor starts if the API never seeded it.
    pub start_id: u64,
    pub stride: StridePolicy,
    /// How many fallback entries to hand out per call.
    pub fallback_count: usize,
    pub max_attempted: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            start_id: 200_000,
            stride: StridePolicy::default(),
            fallback_count: 20,
            max_attempted: DEFAULT_MAX_ATTEMPTED,
        }
    }
}

/// Where a batch of results came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    PagedApi { page: u32 },
    IdScan { from: u64 },
    Fallback,
    /// Cancelled before any source produced results.
    None,
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub items: Vec<ResourceDescriptor>,
    pub source: DiscoverySource,
    pub cancelled: bool,
}

impl Discovery {
    fn cancelled(items: Vec<ResourceDescriptor>, source: DiscoverySource) -> Self {
        Self {
            items,
            source,
            cancelled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub next_id: Option<u64>,
    pub next_page: u32,
    pub attempted: usize,
    pub miss_streak: usize,
}

struct CursorSlot {
    epoch: u64,
    cursor: DiscoveryCursor,
}

struct Attempt {
    items: Vec<ResourceDescriptor>,
    source: DiscoverySource,
    cancelled: bool,
}

/// Runs strategies in order behind their breakers, then the fallback.
///
/// Owns the cursors for one session. Several calls may run at once; the
/// cursor lock is only held between awaits, and ID windows are reserved
/// before probing so concurrent scans never overlap.
pub struct DiscoveryPipeline {
    sources: DiscoverySources,
    config: PipelineConfig,
    slot: Mutex<CursorSlot>,
}

impl DiscoveryPipeline {
    pub fn new(sources: DiscoverySources, config: PipelineConfig) -> Self {
        let cursor = DiscoveryCursor::new(config.max_attempted);
        Self {
            sources,
            config,
            slot: Mutex::new(CursorSlot { epoch: 0, cursor }),
        }
    }

    pub fn sources(&self) -> &DiscoverySources {
        &self.sources
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CursorSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget all progress. Results of calls still in flight are not committed.
    pub fn reset(&self) {
        let mut slot = self.lock();
        slot.epoch += 1;
        slot.cursor = DiscoveryCursor::new(self.config.max_attempted);
    }

    pub fn reset_pages(&self) {
        self.lock().cursor.pages.reset();
    }

    pub fn snapshot(&self) -> CursorSnapshot {
        let slot = self.lock();
        CursorSnapshot {
            next_id: slot.cursor.ids.next(),
            next_page: slot.cursor.pages.current(),
            attempted: slot.cursor.ids.attempted().len(),
            miss_streak: slot.cursor.ids.miss_streak(),
        }
    }

    /// Preferred strategy, then the other one, then the fallback catalog.
    pub async fn discover(
        &self,
        preferred: Strategy,
        filter: &FilterParams,
        cancel: &CancellationToken,
    ) -> Discovery {
        self.discover_with(&[preferred, preferred.alternate()], filter, cancel)
            .await
    }

    /// Try each strategy in `order`, then the fallback catalog.
    ///
    /// Non-empty unless cancelled. A cancelled call returns whatever was
    /// found before the cancellation and skips the fallback.
    pub async fn discover_with(
        &self,
        order: &[Strategy],
        filter: &FilterParams,
        cancel: &CancellationToken,
    ) -> Discovery {
        for &strategy in order {
            if cancel.is_cancelled() {
                return Discovery::cancelled(Vec::new(), DiscoverySource::None);
            }

            let result = match strategy {
                Strategy::PagedApi => self.run_paged(filter, cancel).await,
                Strategy::IdScan => self.run_scan(cancel).await,
            };

            match result {
                Ok(attempt) if attempt.cancelled => {
                    return Discovery::cancelled(attempt.items, attempt.source);
                }
                Ok(attempt) if !attempt.items.is_empty() => {
                    return Discovery {
                        items: attempt.items,
                        source: attempt.source,
                        cancelled: false,
                    };
                }
                Ok(_) => debug!("{} returned nothing new", strategy),
                Err(DiscoveryError::Cancelled) => {
                    return Discovery::cancelled(Vec::new(), DiscoverySource::None);
                }
                Err(e @ DiscoveryError::CircuitOpen(_)) => debug!("Skipping {}: {}", strategy, e),
                Err(e) => warn!("{} failed: {}", strategy, e),
            }
        }

        let items = self.sources.fallback.get(self.config.fallback_count);
        info!("Serving {} items from the fallback catalog", items.len());
        Discovery {
            items,
            source: DiscoverySource::Fallback,
            cancelled: false,
        }
    }

    async fn run_paged(
        &self,
        filter: &FilterParams,
        cancel: &CancellationToken,
    ) -> Result<Attempt, DiscoveryError> {
        let breaker = self.sources.breaker(Strategy::PagedApi);
        breaker.check()?;

        let (epoch, page) = {
            let mut slot = self.lock();
            let page = slot.cursor.pages.reserve();
            (slot.epoch, page)
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.release_page(epoch, page);
                return Err(DiscoveryError::Cancelled);
            }
            result = self.sources.pages.fetch_page(page, self.config.page_size, filter) => result,
        };

        let items = match fetched {
            Ok(items) => items,
            Err(e) => {
                self.release_page(epoch, page);
                if e.counts_as_failure() {
                    breaker.record_failure();
                }
                return Err(e);
            }
        };
        breaker.record_success();

        let mut slot = self.lock();
        if slot.epoch == epoch {
            let ids = &mut slot.cursor.ids;
            let mut highest = None;
            for id in items.iter().filter_map(ResourceDescriptor::numeric_id) {
                ids.mark_attempted(id);
                highest = highest.max(Some(id));
            }
            if let Some(highest) = highest {
                if ids.seed(highest) {
                    debug!("ID cursor seeded at {}", highest);
                }
            }
        }

        Ok(Attempt {
            items,
            source: DiscoverySource::PagedApi { page },
            cancelled: false,
        })
    }

    fn release_page(&self, epoch: u64, page: u32) {
        let mut slot = self.lock();
        if slot.epoch == epoch {
            slot.cursor.pages.release(page);
        }
    }

    async fn run_scan(&self, cancel: &CancellationToken) -> Result<Attempt, DiscoveryError> {
        let breaker = self.sources.breaker(Strategy::IdScan);
        breaker.check()?;

        let policy = self.config.stride;
        let (epoch, reservation) = {
            let mut slot = self.lock();
            let ids = &mut slot.cursor.ids;
            ids.seed(self.config.start_id);
            let mut reservation = ids.reserve(self.config.batch_size);
            if reservation.is_empty() {
                policy.escape_dead_window(ids);
                reservation = ids.reserve(self.config.batch_size);
            }
            (slot.epoch, reservation)
        };

        if reservation.is_empty() {
            return Err(DiscoveryError::EmptyTerminal);
        }

        let report = self
            .sources
            .scanner
            .probe_ids(&reservation.ids, cancel)
            .await;

        {
            let mut slot = self.lock();
            if slot.epoch == epoch {
                let ids = &mut slot.cursor.ids;
                ids.commit(&reservation, &report.completed, report.found.len());
                if !report.cancelled {
                    policy.after_batch(ids, report.found.len());
                }
            }
        }

        match report.verdict() {
            ScanVerdict::Found => breaker.record_success(),
            ScanVerdict::Failed(e) => {
                breaker.record_failure();
                return Err(e);
            }
            ScanVerdict::Empty => {}
        }

        Ok(Attempt {
            items: report.found,
            source: DiscoverySource::IdScan {
                from: reservation.from,
            },
            cancelled: report.cancelled,
        })
    }
}
