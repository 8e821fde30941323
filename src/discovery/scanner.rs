use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::DiscoveryError;
use crate::domain::{IdCursor, Reservation, ResourceDescriptor, UrlTemplates};
use crate::fetcher::http_probe::DEFAULT_PROBE_TIMEOUT;
use crate::fetcher::{Probe, ProbeOutcome};

pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Lifetime probe counters.
#[derive(Debug, Default)]
pub struct ScanStats {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
}

impl ScanStats {
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Probes that found an existing resource.
    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// What happened to one batch of probes.
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    /// Existing resources, highest ID first.
    pub found: Vec<ResourceDescriptor>,
    /// IDs whose probe finished, whatever the outcome.
    pub completed: Vec<u64>,
    pub not_found: usize,
    pub transient: usize,
    pub timeouts: usize,
    /// The batch was cut short; unfinished IDs are not in `completed`.
    pub cancelled: bool,
}

/// How a batch should be counted by the strategy's breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Found,
    /// Nothing found, but the source answered.
    Empty,
    /// Every finished probe failed.
    Failed(DiscoveryError),
}

impl ScanReport {
    pub fn verdict(&self) -> ScanVerdict {
        if !self.found.is_empty() {
            return ScanVerdict::Found;
        }
        let failures = self.transient + self.timeouts;
        if self.completed.is_empty() || failures < self.completed.len() {
            return ScanVerdict::Empty;
        }
        if self.timeouts == self.completed.len() {
            ScanVerdict::Failed(DiscoveryError::ProbeTimeout(format!(
                "{} probes timed out",
                self.timeouts
            )))
        } else {
            ScanVerdict::Failed(DiscoveryError::ProbeTransient(format!(
                "{} probes failed",
                failures
            )))
        }
    }
}

/// Outcome of [`IdSpaceScanner::scan_batch`].
#[derive(Debug, Clone)]
pub struct ScanBatch {
    pub reservation: Reservation,
    pub report: ScanReport,
    pub next_cursor: Option<u64>,
}

enum Probed {
    Answered(ProbeOutcome),
    TimedOut,
}

/// Finds resources by probing candidate URLs built from numeric IDs.
pub struct IdSpaceScanner {
    probe: Arc<dyn Probe + Send + Sync>,
    templates: UrlTemplates,
    permits: Semaphore,
    probe_timeout: Duration,
    stats: ScanStats,
}

impl IdSpaceScanner {
    pub fn new(probe: Arc<dyn Probe + Send + Sync>, templates: UrlTemplates) -> Self {
        Self::with_concurrency(probe, templates, DEFAULT_BATCH_SIZE)
    }

    pub fn with_concurrency(
        probe: Arc<dyn Probe + Send + Sync>,
        templates: UrlTemplates,
        max_concurrency: usize,
    ) -> Self {
        Self {
            probe,
            templates,
            permits: Semaphore::new(max_concurrency.max(1)),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            stats: ScanStats::default(),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn templates(&self) -> &UrlTemplates {
        &self.templates
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Probe every ID concurrently and collect what exists.
    ///
    /// Completion order does not matter: `found` is sorted by descending ID.
    /// On cancellation the outstanding probes are dropped and the partial
    /// result is returned with `cancelled` set.
    pub async fn probe_ids(&self, ids: &[u64], cancel: &CancellationToken) -> ScanReport {
        let mut report = ScanReport::default();
        if ids.is_empty() {
            return report;
        }

        let mut pending: FuturesUnordered<_> = ids
            .iter()
            .map(|&id| self.probe_one(id))
            .collect();
        let mut found_ids = Vec::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Scan cancelled with {} probes outstanding", pending.len());
                    report.cancelled = true;
                    break;
                }
                next = pending.next() => {
                    let Some((id, probed)) = next else { break };
                    report.completed.push(id);
                    match probed {
                        Probed::Answered(ProbeOutcome::Exists) => found_ids.push(id),
                        Probed::Answered(ProbeOutcome::NotFound) => report.not_found += 1,
                        Probed::Answered(ProbeOutcome::TransientError) => report.transient += 1,
                        Probed::TimedOut => report.timeouts += 1,
                    }
                }
            }
        }

        found_ids.sort_unstable_by(|a, b| b.cmp(a));
        report.found = found_ids
            .into_iter()
            .map(|id| ResourceDescriptor::from_numeric_id(id, &self.templates))
            .collect();

        self.stats
            .total
            .fetch_add(report.completed.len() as u64, Ordering::Relaxed);
        self.stats
            .successful
            .fetch_add(report.found.len() as u64, Ordering::Relaxed);
        self.stats
            .failed
            .fetch_add((report.transient + report.timeouts) as u64, Ordering::Relaxed);

        report
    }

    async fn probe_one(&self, id: u64) -> (u64, Probed) {
        let url = self.templates.thumbnail_url(&id.to_string());
        let _permit = self.permits.acquire().await.ok();

        match tokio::time::timeout(self.probe_timeout, self.probe.probe(&url)).await {
            Ok(outcome) => (id, Probed::Answered(outcome)),
            Err(_) => {
                debug!("Probe for {} timed out", id);
                (id, Probed::TimedOut)
            }
        }
    }

    /// Reserve the next window from `cursor`, probe it and commit the result.
    ///
    /// Stride jumps are left to the caller.
    pub async fn scan_batch(
        &self,
        cursor: &mut IdCursor,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> ScanBatch {
        let reservation = cursor.reserve(batch_size);
        let report = self.probe_ids(&reservation.ids, cancel).await;
        cursor.commit(&reservation, &report.completed, report.found.len());

        info!(
            "Scanned {} ids from {}: {} found",
            report.completed.len(),
            reservation.from,
            report.found.len()
        );

        ScanBatch {
            next_cursor: cursor.next(),
            reservation,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ids_of, ScriptedProbe};

    fn scanner(probe: ScriptedProbe) -> (IdSpaceScanner, Arc<ScriptedProbe>) {
        let probe = Arc::new(probe);
        let scanner = IdSpaceScanner::new(probe.clone(), UrlTemplates::default());
        (scanner, probe)
    }

    #[tokio::test]
    async fn test_scan_batch_finds_existing_ids() {
        let (scanner, _) = scanner(ScriptedProbe::existing([99, 97]));
        let mut cursor = IdCursor::new(100);

        let batch = scanner
            .scan_batch(&mut cursor, 5, &CancellationToken::new())
            .await;

        assert_eq!(ids_of(&batch.report.found), vec!["99", "97"]);
        assert_eq!(batch.next_cursor, Some(95));
        for id in 96..=100 {
            assert!(cursor.is_attempted(id));
        }
        assert_eq!(batch.report.verdict(), ScanVerdict::Found);
    }

    #[tokio::test]
    async fn test_found_order_ignores_completion_order() {
        let probe = ScriptedProbe::existing([50, 49, 48])
            .with_delay(50, Duration::from_millis(60))
            .with_delay(49, Duration::from_millis(30));
        let (scanner, _) = scanner(probe);

        let report = scanner
            .probe_ids(&[50, 49, 48], &CancellationToken::new())
            .await;
        assert_eq!(ids_of(&report.found), vec!["50", "49", "48"]);
    }

    #[tokio::test]
    async fn test_found_urls_use_templates() {
        let (scanner, _) = scanner(ScriptedProbe::existing([7]));
        let report = scanner.probe_ids(&[7], &CancellationToken::new()).await;
        assert_eq!(
            report.found[0].full_url,
            "https://backiee.com/static/wallpapers/wide/7.jpg"
        );
    }

    #[tokio::test]
    async fn test_all_transient_is_a_failure() {
        let (scanner, _) = scanner(ScriptedProbe::always(ProbeOutcome::TransientError));
        let report = scanner
            .probe_ids(&[5, 4, 3], &CancellationToken::new())
            .await;
        assert_eq!(report.transient, 3);
        assert!(matches!(
            report.verdict(),
            ScanVerdict::Failed(DiscoveryError::ProbeTransient(_))
        ));
        assert_eq!(scanner.stats().failed(), 3);
    }

    #[tokio::test]
    async fn test_misses_are_not_a_failure() {
        let probe = ScriptedProbe::new().with_outcome(3, ProbeOutcome::TransientError);
        let (scanner, _) = scanner(probe);
        let report = scanner
            .probe_ids(&[5, 4, 3], &CancellationToken::new())
            .await;
        assert_eq!(report.not_found, 2);
        assert_eq!(report.verdict(), ScanVerdict::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out() {
        let probe = ScriptedProbe::existing([9]).with_delay(9, Duration::from_secs(60));
        let (scanner, _) = scanner(probe);
        let scanner = scanner.with_probe_timeout(Duration::from_secs(1));

        let report = scanner.probe_ids(&[9], &CancellationToken::new()).await;
        assert_eq!(report.timeouts, 1);
        assert!(report.found.is_empty());
        assert!(matches!(
            report.verdict(),
            ScanVerdict::Failed(DiscoveryError::ProbeTimeout(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_partial_results_and_defers_rest() {
        let probe = ScriptedProbe::existing([20, 19])
            .with_delay(18, Duration::from_secs(30))
            .with_delay(17, Duration::from_secs(30));
        let (scanner, _) = scanner(probe);
        let mut cursor = IdCursor::new(20);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let batch = scanner.scan_batch(&mut cursor, 4, &cancel).await;
        assert!(batch.report.cancelled);
        assert_eq!(ids_of(&batch.report.found), vec!["20", "19"]);
        assert!(!cursor.is_attempted(18));
        assert_eq!(cursor.deferred_len(), 2);

        let retry = cursor.reserve(4);
        assert_eq!(&retry.ids[..2], &[18, 17]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let probe = ScriptedProbe::new();
        let probe = (0..10u64).fold(probe, |p, id| p.with_delay(id + 1, Duration::from_millis(20)));
        let probe = Arc::new(probe);
        let scanner = IdSpaceScanner::with_concurrency(probe.clone(), UrlTemplates::default(), 2);

        let started = std::time::Instant::now();
        let ids: Vec<u64> = (1..=10).collect();
        let report = scanner.probe_ids(&ids, &CancellationToken::new()).await;

        assert_eq!(report.completed.len(), 10);
        assert_eq!(probe.calls(), 10);
        // Five rounds of two probes each.
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
