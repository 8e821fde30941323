use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::{FeedConfig, FeedState, ScrollTrigger, ScrollViewport};
use crate::app::Result;
use crate::discovery::{DiscoveryPipeline, DiscoverySource, Strategy};
use crate::domain::{FilterParams, ResourceDescriptor};
use crate::settings::SettingsProvider;

/// Which kind of load produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrigin {
    Initial,
    Foreground,
    Background,
}

/// Notification sent to subscribers whenever the feed changes.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The feed was cleared for a fresh initial load.
    Reset,
    ItemsAdded {
        origin: FeedOrigin,
        items: Vec<ResourceDescriptor>,
        /// Feed length after the append
        total: usize,
    },
}

struct LoaderInner {
    pipeline: DiscoveryPipeline,
    settings: Arc<dyn SettingsProvider + Send + Sync>,
    config: FeedConfig,
    state: Mutex<FeedState>,
    filter: Mutex<FilterParams>,
    foreground: Semaphore,
    background: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    events: broadcast::Sender<FeedEvent>,
    scroll: Mutex<ScrollTrigger>,
}

/// Orchestrates initial, on-demand and background loads into one feed.
///
/// At most one foreground load runs at a time; a second request while one is
/// in flight returns immediately with nothing. Background prefetches run on
/// their own bounded pool and merge into the same state.
#[derive(Clone)]
pub struct FeedLoader {
    inner: Arc<LoaderInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeedLoader {
    pub fn new(
        pipeline: DiscoveryPipeline,
        settings: Arc<dyn SettingsProvider + Send + Sync>,
        config: FeedConfig,
    ) -> Self {
        let filter = match settings.get() {
            Ok(prefs) => prefs.filter,
            Err(e) => {
                warn!("Failed to read settings, using default filter: {}", e);
                FilterParams::default()
            }
        };
        let scroll = ScrollTrigger::new(
            config.scroll_threshold,
            config.scroll_debounce(),
            config.scroll_save_interval(),
        );
        let (events, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(LoaderInner {
                pipeline,
                settings,
                background: Arc::new(Semaphore::new(config.background_concurrency.max(1))),
                config,
                state: Mutex::new(FeedState::new()),
                filter: Mutex::new(filter),
                foreground: Semaphore::new(1),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                events,
                scroll: Mutex::new(scroll),
            }),
        }
    }

    pub fn pipeline(&self) -> &DiscoveryPipeline {
        &self.inner.pipeline
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the feed in display order.
    pub fn snapshot(&self) -> Vec<ResourceDescriptor> {
        lock(&self.inner.state).items().to_vec()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.state).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.state).is_empty()
    }

    pub fn filter(&self) -> FilterParams {
        lock(&self.inner.filter).clone()
    }

    /// Number of background prefetches currently running.
    pub fn background_in_flight(&self) -> usize {
        self.inner.config.background_concurrency.max(1) - self.inner.background.available_permits()
    }

    /// Persist a new filter. Takes effect for the next load; call
    /// [`FeedLoader::load_initial`] to restart the feed with it.
    pub fn set_filter(&self, filter: FilterParams) -> Result<()> {
        let stored = filter.clone();
        self.inner
            .settings
            .update(&mut |prefs| prefs.filter = stored.clone())?;
        *lock(&self.inner.filter) = filter;
        Ok(())
    }

    /// Clear the feed and fill it from the paged API, or from the fallback
    /// catalog if the API has nothing.
    pub async fn load_initial(&self) -> Vec<ResourceDescriptor> {
        let Ok(permit) = self.inner.foreground.acquire().await else {
            return Vec::new();
        };

        let filter = self.reload_filter();
        let generation = {
            let mut state = lock(&self.inner.state);
            state.clear();
            state.generation()
        };
        self.inner.pipeline.reset();
        let _ = self.inner.events.send(FeedEvent::Reset);

        let cancel = self.inner.shutdown.child_token();
        let discovery = self
            .inner
            .pipeline
            .discover_with(&[Strategy::PagedApi], &filter, &cancel)
            .await;
        let items = self.fresh_items(discovery.source, discovery.items);
        let appended = self.merge(generation, items, FeedOrigin::Initial);
        info!(
            "Initial load: {} items from {:?}",
            appended.len(),
            discovery.source
        );

        drop(permit);
        if !appended.is_empty() && self.inner.config.prefetch_after_load {
            self.prefetch_in_background();
        }
        appended
    }

    /// Fetch the next batch and append whatever is new.
    ///
    /// Returns an empty list at once if another foreground load is running.
    pub async fn load_more(&self) -> Vec<ResourceDescriptor> {
        let cancel = self.inner.shutdown.child_token();
        self.load_more_with(&cancel).await
    }

    /// [`FeedLoader::load_more`] that stops early when `cancel` fires.
    ///
    /// Items found before the cancellation are still appended.
    pub async fn load_more_with(&self, cancel: &CancellationToken) -> Vec<ResourceDescriptor> {
        let Ok(permit) = self.inner.foreground.try_acquire() else {
            debug!("Load already in progress, ignoring request");
            return Vec::new();
        };

        let appended = self.discover_and_merge(FeedOrigin::Foreground, cancel).await;

        drop(permit);
        if !appended.is_empty() && self.inner.config.prefetch_after_load && !cancel.is_cancelled() {
            self.prefetch_in_background();
        }
        appended
    }

    /// Schedule a prefetch unless the background pool is full.
    ///
    /// Returns whether a task was started.
    pub fn prefetch_in_background(&self) -> bool {
        self.spawn_prefetch(0)
    }

    fn spawn_prefetch(&self, depth: usize) -> bool {
        if self.inner.shutdown.is_cancelled() {
            return false;
        }
        let Ok(permit) = self.inner.background.clone().try_acquire_owned() else {
            debug!("Background prefetch limit reached");
            return false;
        };

        let loader = self.clone();
        self.inner.tracker.spawn(async move {
            let _permit = permit;
            let cancel = loader.inner.shutdown.child_token();

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(loader.inner.config.prefetch_delay()) => {}
            }

            let appended = loader
                .discover_and_merge(FeedOrigin::Background, &cancel)
                .await;
            debug!("Background prefetch added {} items", appended.len());

            // Chain while the source keeps producing, up to the limit.
            if !appended.is_empty() && depth < loader.inner.config.prefetch_chain_limit {
                loader.spawn_prefetch(depth + 1);
            }
        });
        true
    }

    /// Feed a scroll event. Persists the offset now and then, and loads more
    /// once the viewport nears the end.
    pub async fn on_scroll(&self, viewport: ScrollViewport) -> Vec<ResourceDescriptor> {
        let now = Instant::now();
        let (load, save) = {
            let mut trigger = lock(&self.inner.scroll);
            (trigger.should_load(viewport, now), trigger.should_save(now))
        };

        if save {
            if let Err(e) = self
                .inner
                .settings
                .update(&mut |prefs| prefs.scroll_position = viewport.offset)
            {
                warn!("Failed to save scroll position: {}", e);
            }
        }

        if load {
            self.load_more().await
        } else {
            Vec::new()
        }
    }

    /// Last saved scroll offset, for restoring the view.
    pub fn saved_scroll_position(&self) -> f64 {
        self.inner
            .settings
            .get()
            .map(|prefs| prefs.scroll_position)
            .unwrap_or(0.0)
    }

    /// Wait for every background prefetch, including chained ones.
    pub async fn wait_for_background(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }

    /// Cancel pending work and wait for background tasks to exit.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Feed loader stopped");
    }

    async fn discover_and_merge(
        &self,
        origin: FeedOrigin,
        cancel: &CancellationToken,
    ) -> Vec<ResourceDescriptor> {
        let generation = lock(&self.inner.state).generation();
        let filter = self.filter();

        let discovery = self
            .inner
            .pipeline
            .discover(self.inner.config.preferred_strategy, &filter, cancel)
            .await;
        if discovery.cancelled {
            debug!("Load cancelled with {} partial results", discovery.items.len());
        }

        let items = self.fresh_items(discovery.source, discovery.items);
        self.merge(generation, items, origin)
    }

    /// Swap fallback entries the feed already shows for ones it doesn't.
    ///
    /// Empty only once the feed holds the whole catalog.
    fn fresh_items(
        &self,
        source: DiscoverySource,
        items: Vec<ResourceDescriptor>,
    ) -> Vec<ResourceDescriptor> {
        if source != DiscoverySource::Fallback {
            return items;
        }

        let state = lock(&self.inner.state);
        let fresh: Vec<_> = items
            .into_iter()
            .filter(|item| !state.contains(item.id()))
            .collect();
        if !fresh.is_empty() {
            return fresh;
        }

        let count = self.inner.pipeline.config().fallback_count;
        let unseen = self
            .inner
            .pipeline
            .sources()
            .fallback
            .get_unseen(count, |id| state.contains(id));
        if unseen.is_empty() {
            debug!("Feed already holds every fallback entry");
        }
        unseen
    }

    fn merge(
        &self,
        generation: u64,
        items: Vec<ResourceDescriptor>,
        origin: FeedOrigin,
    ) -> Vec<ResourceDescriptor> {
        let (appended, total) = {
            let mut state = lock(&self.inner.state);
            if state.generation() != generation {
                debug!("Dropping {} results from a previous session", items.len());
                return Vec::new();
            }
            let appended = state.merge(items);
            (appended, state.len())
        };

        if !appended.is_empty() {
            let _ = self.inner.events.send(FeedEvent::ItemsAdded {
                origin,
                items: appended.clone(),
                total,
            });
        }
        appended
    }

    fn reload_filter(&self) -> FilterParams {
        match self.inner.settings.get() {
            Ok(prefs) => {
                *lock(&self.inner.filter) = prefs.filter.clone();
                prefs.filter
            }
            Err(e) => {
                warn!("Failed to read settings, keeping current filter: {}", e);
                self.filter()
            }
        }
    }
}
