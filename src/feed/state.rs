use std::collections::HashSet;

use crate::domain::ResourceDescriptor;

/// The ordered list of items shown to the user.
///
/// Every id appears at most once. Items are only ever appended, so the
/// relative order of anything already shown never changes.
#[derive(Debug, Default, Clone)]
pub struct FeedState {
    items: Vec<ResourceDescriptor>,
    seen_ids: HashSet<String>,
    generation: u64,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ResourceDescriptor] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    /// Bumped by every [`FeedState::clear`]; lets late results from an
    /// earlier session be recognised and dropped.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append the unseen part of `batch`, keeping its order.
    ///
    /// Returns exactly the items that were appended.
    pub fn merge(&mut self, batch: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor> {
        let mut appended = Vec::new();
        for item in batch {
            if self.seen_ids.insert(item.id().to_string()) {
                appended.push(item.clone());
                self.items.push(item);
            }
        }
        appended
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen_ids.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{descriptors, ids_of};

    #[test]
    fn test_merge_skips_seen_ids() {
        let mut state = FeedState::new();
        state.merge(descriptors([1, 2, 3]));
        let appended = state.merge(descriptors([3, 4, 2, 5]));

        assert_eq!(ids_of(&appended), vec!["4", "5"]);
        assert_eq!(ids_of(state.items()), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_merge_dedups_within_batch() {
        let mut state = FeedState::new();
        let appended = state.merge(descriptors([7, 7, 8]));
        assert_eq!(ids_of(&appended), vec!["7", "8"]);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_clear_bumps_generation() {
        let mut state = FeedState::new();
        state.merge(descriptors([1]));
        let before = state.generation();
        state.clear();
        assert!(state.is_empty());
        assert!(!state.contains("1"));
        assert_eq!(state.generation(), before + 1);
    }
}
