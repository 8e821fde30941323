use std::collections::{BTreeSet, HashSet};

/// Default cap on the attempted-ID set before pruning kicks in.
pub const DEFAULT_MAX_ATTEMPTED: usize = 100_000;

/// Progress marker for the ID-space strategy.
///
/// `next` only moves downward, except for explicit jumps. Every probed ID is
/// remembered in `attempted` and never handed out again. IDs that were
/// reserved by a batch but not probed (the batch was cancelled) are parked
/// in `deferred` and handed out first by the next reservation.
#[derive(Debug, Clone)]
pub struct IdCursor {
    next: Option<u64>,
    attempted: HashSet<u64>,
    in_flight: HashSet<u64>,
    deferred: BTreeSet<u64>,
    miss_streak: usize,
    max_attempted: usize,
}

/// IDs handed to one batch, highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub ids: Vec<u64>,
    /// Cursor value when the reservation was taken.
    pub from: u64,
}

impl Reservation {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for IdCursor {
    fn default() -> Self {
        Self::unstarted(DEFAULT_MAX_ATTEMPTED)
    }
}

impl IdCursor {
    pub fn new(start: u64) -> Self {
        let mut cursor = Self::default();
        cursor.next = Some(start);
        cursor
    }

    pub fn unstarted(max_attempted: usize) -> Self {
        Self {
            next: None,
            attempted: HashSet::new(),
            in_flight: HashSet::new(),
            deferred: BTreeSet::new(),
            miss_streak: 0,
            max_attempted,
        }
    }

    pub fn with_attempted(start: u64, attempted: impl IntoIterator<Item = u64>) -> Self {
        let mut cursor = Self::new(start);
        cursor.attempted.extend(attempted);
        cursor
    }

    pub fn next(&self) -> Option<u64> {
        self.next
    }

    pub fn is_started(&self) -> bool {
        self.next.is_some()
    }

    /// Set the starting point if the cursor has not started yet.
    pub fn seed(&mut self, start: u64) -> bool {
        if self.next.is_some() {
            return false;
        }
        self.next = Some(start);
        true
    }

    pub fn attempted(&self) -> &HashSet<u64> {
        &self.attempted
    }

    pub fn is_attempted(&self, id: u64) -> bool {
        self.attempted.contains(&id)
    }

    pub fn mark_attempted(&mut self, id: u64) {
        self.attempted.insert(id);
        self.deferred.remove(&id);
    }

    pub fn miss_streak(&self) -> usize {
        self.miss_streak
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Hand out up to `batch_size` IDs for probing.
    ///
    /// Deferred IDs come first, then the window `next, next-1, ...` with
    /// zero, attempted and in-flight IDs skipped. The cursor moves to one
    /// below the lowest window ID handed out. An empty reservation means the
    /// window is dead and the caller should jump.
    pub fn reserve(&mut self, batch_size: usize) -> Reservation {
        let from = self.next.unwrap_or(0);
        let mut ids = Vec::with_capacity(batch_size);

        while ids.len() < batch_size {
            match self.deferred.pop_last() {
                Some(id) => ids.push(id),
                None => break,
            }
        }

        let window = batch_size - ids.len();
        let mut lowest = None;
        for offset in 0..window as u64 {
            let id = match from.checked_sub(offset) {
                Some(id) if id > 0 => id,
                _ => break,
            };
            if self.attempted.contains(&id) || self.in_flight.contains(&id) {
                continue;
            }
            ids.push(id);
            lowest = Some(id);
        }

        if let Some(lowest) = lowest {
            self.next = Some(lowest - 1);
        }

        ids.sort_unstable_by(|a, b| b.cmp(a));
        self.in_flight.extend(ids.iter().copied());

        Reservation { ids, from }
    }

    /// Record which reserved IDs were actually probed.
    ///
    /// Probed IDs become attempted whatever their outcome. Reserved IDs that
    /// never completed are deferred for the next reservation.
    pub fn commit(&mut self, reservation: &Reservation, completed: &[u64], found: usize) {
        let completed: HashSet<u64> = completed.iter().copied().collect();
        for id in &reservation.ids {
            self.in_flight.remove(id);
            if completed.contains(id) {
                self.attempted.insert(*id);
            } else if !self.attempted.contains(id) {
                self.deferred.insert(*id);
            }
        }

        if found > 0 {
            self.miss_streak = 0;
        } else {
            self.miss_streak += completed.len();
        }

        if self.attempted.len() > self.max_attempted {
            self.prune_behind();
        }
    }

    /// Move the cursor to `target`, as decided by a stride jump.
    pub fn jump_to(&mut self, target: u64) {
        let wrapped = self.next.is_some_and(|current| target > current);
        self.next = Some(target);
        self.miss_streak = 0;
        if wrapped {
            // Nothing above the new start can be handed out again.
            self.attempted.retain(|id| *id <= target);
        }
    }

    /// Drop attempted IDs above the cursor; the window has already passed them.
    fn prune_behind(&mut self) {
        if let Some(next) = self.next {
            let before = self.attempted.len();
            self.attempted.retain(|id| *id <= next);
            tracing::debug!(
                "Pruned {} attempted ids above cursor {}",
                before - self.attempted.len(),
                next
            );
        }
    }
}

/// Progress marker for the paged strategy. Pages start at 1.
///
/// Every fetch reserves its own page first, so concurrent fetches never ask
/// for the same page. A page whose fetch failed is parked in `retry` and
/// handed out again before any new page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    next_unreserved: u32,
    retry: BTreeSet<u32>,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            next_unreserved: 1,
            retry: BTreeSet::new(),
        }
    }
}

impl PageCursor {
    /// The page the next reservation will hand out.
    pub fn current(&self) -> u32 {
        self.retry
            .first()
            .copied()
            .unwrap_or(self.next_unreserved)
    }

    pub fn reserve(&mut self) -> u32 {
        if let Some(page) = self.retry.pop_first() {
            return page;
        }
        let page = self.next_unreserved;
        self.next_unreserved = page.saturating_add(1);
        page
    }

    /// Give back a reserved page that was not fetched successfully.
    pub fn release(&mut self, page: u32) {
        if page < self.next_unreserved {
            self.retry.insert(page);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Both strategy cursors for one feed or scraper session.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCursor {
    pub ids: IdCursor,
    pub pages: PageCursor,
}

impl DiscoveryCursor {
    pub fn new(max_attempted: usize) -> Self {
        Self {
            ids: IdCursor::unstarted(max_attempted),
            pages: PageCursor::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_window_descending() {
        let mut cursor = IdCursor::new(100);
        let r = cursor.reserve(5);
        assert_eq!(r.ids, vec![100, 99, 98, 97, 96]);
        assert_eq!(r.from, 100);
        assert_eq!(cursor.next(), Some(95));
        assert_eq!(cursor.in_flight_len(), 5);
    }

    #[test]
    fn test_reserve_skips_attempted_and_zero() {
        let mut cursor = IdCursor::with_attempted(4, [3]);
        let r = cursor.reserve(10);
        assert_eq!(r.ids, vec![4, 2, 1]);
        assert_eq!(cursor.next(), Some(0));

        let r = cursor.reserve(10);
        assert!(r.is_empty());
    }

    #[test]
    fn test_concurrent_reservations_do_not_overlap() {
        let mut cursor = IdCursor::new(50);
        let a = cursor.reserve(5);
        let b = cursor.reserve(5);
        assert_eq!(a.ids, vec![50, 49, 48, 47, 46]);
        assert_eq!(b.ids, vec![45, 44, 43, 42, 41]);
    }

    #[test]
    fn test_commit_defers_unfinished_ids() {
        let mut cursor = IdCursor::new(10);
        let r = cursor.reserve(4);
        cursor.commit(&r, &[10, 8], 0);

        assert!(cursor.is_attempted(10));
        assert!(cursor.is_attempted(8));
        assert_eq!(cursor.deferred_len(), 2);
        assert_eq!(cursor.in_flight_len(), 0);
        assert_eq!(cursor.miss_streak(), 2);

        let next = cursor.reserve(4);
        assert_eq!(next.ids, vec![9, 7, 6, 5]);
    }

    #[test]
    fn test_commit_with_find_resets_miss_streak() {
        let mut cursor = IdCursor::new(10);
        let r = cursor.reserve(3);
        cursor.commit(&r, &r.ids.clone(), 0);
        assert_eq!(cursor.miss_streak(), 3);
        let r = cursor.reserve(3);
        cursor.commit(&r, &r.ids.clone(), 1);
        assert_eq!(cursor.miss_streak(), 0);
    }

    #[test]
    fn test_jump_wrap_prunes_ids_above_target() {
        let mut cursor = IdCursor::with_attempted(5, [300, 4]);
        cursor.jump_to(200);
        assert_eq!(cursor.next(), Some(200));
        assert!(!cursor.is_attempted(300));
        assert!(cursor.is_attempted(4));
    }

    #[test]
    fn test_prune_when_over_capacity() {
        let mut cursor = IdCursor::unstarted(3);
        cursor.seed(10);
        let r = cursor.reserve(5);
        cursor.commit(&r, &r.ids.clone(), 0);
        // Everything probed sits above the cursor (5), so all of it is dropped.
        assert_eq!(cursor.attempted().len(), 0);
        assert_eq!(cursor.next(), Some(5));
    }

    #[test]
    fn test_seed_only_once() {
        let mut cursor = IdCursor::default();
        assert!(cursor.seed(42));
        assert!(!cursor.seed(7));
        assert_eq!(cursor.next(), Some(42));
    }

    #[test]
    fn test_page_cursor_hands_out_each_page_once() {
        let mut pages = PageCursor::default();
        assert_eq!(pages.current(), 1);
        assert_eq!(pages.reserve(), 1);
        assert_eq!(pages.reserve(), 2);
        assert_eq!(pages.current(), 3);
        pages.reset();
        assert_eq!(pages.reserve(), 1);
    }

    #[test]
    fn test_released_page_is_retried_first() {
        let mut pages = PageCursor::default();
        let first = pages.reserve();
        assert_eq!(pages.reserve(), 2);
        pages.release(first);
        assert_eq!(pages.current(), 1);
        assert_eq!(pages.reserve(), 1);
        assert_eq!(pages.reserve(), 3);

        // Pages never handed out cannot be released.
        pages.release(10);
        assert_eq!(pages.current(), 4);
    }
}
