use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::config::format_interval;
use super::ScraperConfig;
use crate::app::Result;
use crate::discovery::{DiscoveryPipeline, DiscoverySource, DiscoverySources, PipelineConfig};
use crate::domain::{FilterParams, ResourceDescriptor};

/// Summary of one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub pages: usize,
    /// Items returned by the pipeline, including ones published before
    pub discovered: usize,
    /// Items published for the first time
    pub published: usize,
    pub used_fallback: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum ScrapeEvent {
    NewResources {
        category: String,
        source: DiscoverySource,
        items: Vec<ResourceDescriptor>,
    },
    RunFinished(ScrapeReport),
}

/// IDs already published, forgetting the oldest beyond `capacity`.
#[derive(Debug)]
struct PublishedIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl PublishedIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `id`. Returns false if it is already remembered.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }
}

struct ScraperInner {
    config: ScraperConfig,
    filter: FilterParams,
    /// One pipeline per category so each keeps its own page cursor
    pipelines: Vec<(String, DiscoveryPipeline)>,
    running: AtomicBool,
    published: Mutex<PublishedIds>,
    events: broadcast::Sender<ScrapeEvent>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Periodic discovery job, independent of any feed.
///
/// At most one run is in flight at a time; a run that would overlap the
/// previous one is skipped. Stopping cancels the schedule only.
pub struct ScraperService {
    inner: Arc<ScraperInner>,
    period: Duration,
    schedule: Mutex<Option<CancellationToken>>,
    tracker: TaskTracker,
}

impl ScraperService {
    pub fn new(
        sources: DiscoverySources,
        pipeline_config: PipelineConfig,
        config: ScraperConfig,
        filter: FilterParams,
    ) -> Result<Self> {
        let period = config.interval()?;

        let mut categories = config.categories.clone();
        if categories.is_empty() {
            categories.push(filter.category.clone());
        }
        let pipelines = categories
            .into_iter()
            .map(|category| {
                let pipeline = DiscoveryPipeline::new(sources.clone(), pipeline_config.clone());
                (category, pipeline)
            })
            .collect();

        let (events, _) = broadcast::channel(64);
        let published = PublishedIds::new(config.max_remembered);

        Ok(Self {
            inner: Arc::new(ScraperInner {
                config,
                filter,
                pipelines,
                running: AtomicBool::new(false),
                published: Mutex::new(published),
                events,
            }),
            period,
            schedule: Mutex::new(None),
            tracker: TaskTracker::new(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScrapeEvent> {
        self.inner.events.subscribe()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_scheduled(&self) -> bool {
        self.lock_schedule().is_some()
    }

    fn lock_schedule(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the timer. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut schedule = self.lock_schedule();
        if schedule.is_some() {
            return false;
        }
        let token = CancellationToken::new();
        *schedule = Some(token.clone());

        info!(
            "Scraper scheduled every {}",
            format_interval(self.period.as_secs())
        );

        let inner = self.inner.clone();
        let tracker = self.tracker.clone();
        let period = self.period;
        self.tracker.spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            if !inner.config.run_on_start {
                timer.tick().await; // Skip the first immediate tick
            }

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {}
                }
                let inner = inner.clone();
                tracker.spawn(async move {
                    inner.try_run().await;
                });
            }
            debug!("Scraper schedule stopped");
        });
        true
    }

    /// Cancel the timer. A run already in flight finishes normally.
    pub fn stop(&self) -> bool {
        match self.lock_schedule().take() {
            Some(token) => {
                token.cancel();
                info!("Scraper stopped");
                true
            }
            None => false,
        }
    }

    /// Run once now, unless a run is already in flight.
    pub async fn scrape_now(&self) -> Option<ScrapeReport> {
        self.inner.try_run().await
    }

    /// Stop the schedule and wait for in-flight runs to finish.
    pub async fn shutdown(&self) {
        self.stop();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl ScraperInner {
    async fn try_run(&self) -> Option<ScrapeReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Scrape already in progress, skipping this run");
            return None;
        }
        let _guard = RunGuard(&self.running);
        Some(self.run_once().await)
    }

    async fn run_once(&self) -> ScrapeReport {
        let started = Instant::now();
        let mut report = ScrapeReport::default();
        // Runs are never cancelled from outside.
        let cancel = CancellationToken::new();

        for (category, pipeline) in &self.pipelines {
            if self.config.restart_each_run {
                pipeline.reset_pages();
            }
            let filter = self.filter.clone().with_category(category.clone());

            for page in 0..self.config.pages_per_run {
                if page > 0 {
                    tokio::time::sleep(self.config.request_delay()).await;
                }

                let discovery = pipeline.discover(self.config.strategy, &filter, &cancel).await;
                let from_fallback = discovery.source == DiscoverySource::Fallback;
                report.pages += 1;
                report.discovered += discovery.items.len();
                report.used_fallback |= from_fallback;

                let fresh: Vec<_> = {
                    let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
                    discovery
                        .items
                        .into_iter()
                        .filter(|d| published.insert(d.id()))
                        .collect()
                };

                if fresh.is_empty() {
                    debug!("Nothing new in '{}', moving on", category);
                    break;
                }

                report.published += fresh.len();
                let _ = self.events.send(ScrapeEvent::NewResources {
                    category: category.clone(),
                    source: discovery.source,
                    items: fresh,
                });

                if from_fallback {
                    break;
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "Scrape finished: {} pages, {} new of {} found in {:.1}s",
            report.pages,
            report.published,
            report.discovered,
            report.elapsed.as_secs_f64()
        );
        let _ = self.events.send(ScrapeEvent::RunFinished(report.clone()));
        report
    }
}
