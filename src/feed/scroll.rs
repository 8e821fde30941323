use std::time::{Duration, Instant};

/// Geometry of a scrollable list at one moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollViewport {
    /// Distance scrolled from the top
    pub offset: f64,
    /// Visible height
    pub viewport: f64,
    /// Total content height
    pub extent: f64,
}

impl ScrollViewport {
    pub fn new(offset: f64, viewport: f64, extent: f64) -> Self {
        Self {
            offset,
            viewport,
            extent,
        }
    }

    /// Fraction of the content above the bottom edge of the viewport.
    pub fn progress(&self) -> f64 {
        if self.extent <= 0.0 {
            return 1.0;
        }
        ((self.offset + self.viewport) / self.extent).clamp(0.0, 1.0)
    }
}

/// Decides when scrolling should load more and when to persist the offset.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    threshold: f64,
    debounce: Duration,
    save_interval: Duration,
    last_check: Option<Instant>,
    last_save: Option<Instant>,
}

impl ScrollTrigger {
    pub fn new(threshold: f64, debounce: Duration, save_interval: Duration) -> Self {
        Self {
            threshold,
            debounce,
            save_interval,
            last_check: None,
            last_save: None,
        }
    }

    /// True when the viewport is past the threshold and the debounce window
    /// since the last check has elapsed.
    pub fn should_load(&mut self, viewport: ScrollViewport, now: Instant) -> bool {
        if let Some(last) = self.last_check {
            if now.saturating_duration_since(last) < self.debounce {
                return false;
            }
        }
        self.last_check = Some(now);
        viewport.progress() > self.threshold
    }

    pub fn should_save(&mut self, now: Instant) -> bool {
        match self.last_save {
            Some(last) if now.saturating_duration_since(last) < self.save_interval => false,
            _ => {
                self.last_save = Some(now);
                true
            }
        }
    }
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::new(0.7, Duration::from_millis(300), Duration::from_secs(2))
    }
}
