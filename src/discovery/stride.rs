use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::IdCursor;

/// A deliberate large cursor move used to leave a dead region of the ID space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrideJump {
    pub amount: u64,
    /// Where to restart when the jump would reach zero or below.
    pub reset_sentinel: u64,
}

/// Used when a window has no probe-able IDs left.
pub const EXHAUSTED_WINDOW_JUMP: StrideJump = StrideJump::new(10_000, 200_000);

/// Used after a long run of misses.
pub const MISS_STREAK_JUMP: StrideJump = StrideJump::new(5_000, 200_000);

impl StrideJump {
    pub const fn new(amount: u64, reset_sentinel: u64) -> Self {
        Self {
            amount,
            reset_sentinel,
        }
    }

    pub fn apply(&self, cursor: u64) -> u64 {
        match cursor.checked_sub(self.amount) {
            Some(next) if next > 0 => next,
            _ => self.reset_sentinel,
        }
    }
}

/// When to jump, and how far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StridePolicy {
    pub exhausted: StrideJump,
    pub miss_streak_threshold: usize,
    pub miss_streak: StrideJump,
}

impl Default for StridePolicy {
    fn default() -> Self {
        Self {
            exhausted: EXHAUSTED_WINDOW_JUMP,
            miss_streak_threshold: 50,
            miss_streak: MISS_STREAK_JUMP,
        }
    }
}

impl StridePolicy {
    /// Jump away from a window where every ID was already tried.
    pub fn escape_dead_window(&self, cursor: &mut IdCursor) -> (u64, u64) {
        let from = cursor.next().unwrap_or(0);
        let to = self.exhausted.apply(from);
        cursor.jump_to(to);
        info!("No new ids to check, jumping from {} to {}", from, to);
        (from, to)
    }

    /// Jump if the cursor has missed too many times in a row.
    pub fn after_batch(&self, cursor: &mut IdCursor, found: usize) -> Option<(u64, u64)> {
        if found > 0 || cursor.miss_streak() <= self.miss_streak_threshold {
            return None;
        }
        let from = cursor.next().unwrap_or(0);
        let to = self.miss_streak.apply(from);
        info!(
            "{} consecutive misses, jumping from {} to {}",
            cursor.miss_streak(),
            from,
            to
        );
        cursor.jump_to(to);
        Some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_moves_down() {
        assert_eq!(EXHAUSTED_WINDOW_JUMP.apply(150_000), 140_000);
        assert_eq!(MISS_STREAK_JUMP.apply(150_000), 145_000);
    }

    #[test]
    fn test_jump_wraps_to_sentinel() {
        let jump = StrideJump::new(10_000, 200_000);
        assert_eq!(jump.apply(9_999), 200_000);
        assert_eq!(jump.apply(10_000), 200_000);
        assert_eq!(jump.apply(0), 200_000);
        assert_eq!(jump.apply(10_001), 1);
    }

    #[test]
    fn test_escape_dead_window() {
        let policy = StridePolicy::default();
        let mut cursor = IdCursor::new(50_000);
        assert_eq!(policy.escape_dead_window(&mut cursor), (50_000, 40_000));
        assert_eq!(cursor.next(), Some(40_000));
    }

    #[test]
    fn test_miss_streak_jump_only_past_threshold() {
        let policy = StridePolicy {
            miss_streak_threshold: 4,
            ..StridePolicy::default()
        };
        let mut cursor = IdCursor::new(100_000);

        let r = cursor.reserve(4);
        cursor.commit(&r, &r.ids.clone(), 0);
        assert_eq!(policy.after_batch(&mut cursor, 0), None);

        let r = cursor.reserve(4);
        cursor.commit(&r, &r.ids.clone(), 0);
        let jumped = policy.after_batch(&mut cursor, 0);
        assert_eq!(jumped, Some((99_992, 94_992)));
        assert_eq!(cursor.miss_streak(), 0);
    }
}
