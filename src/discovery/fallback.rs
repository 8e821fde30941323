use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{error, warn};

use crate::app::{Result, WallfeedError};
use crate::domain::ResourceDescriptor;

/// Bundled placeholder wallpapers served when every live source is down.
pub const DEFAULT_FALLBACK_URLS: &[&str] = &[
    "https://wallpapercave.com/wp/wp2555030.jpg",
    "https://wallpaperaccess.com/full/51363.jpg",
    "https://images.pexels.com/photos/1366919/pexels-photo-1366919.jpeg",
    "https://wallpapercave.com/wp/wp4676582.jpg",
    "https://images.pexels.com/photos/1242348/pexels-photo-1242348.jpeg",
    "https://wallpapercave.com/wp/wp2581576.jpg",
    "https://images.pexels.com/photos/733745/pexels-photo-733745.jpeg",
    "https://wallpaperaccess.com/full/1091424.jpg",
    "https://images.pexels.com/photos/1323550/pexels-photo-1323550.jpeg",
    "https://wallpapercave.com/wp/wp7486693.jpg",
];

/// Last-resort source of descriptors.
///
/// Each `get` hands out the next slice of the seed list, wrapping around, so
/// repeated calls cycle through every seed in a fixed order.
#[derive(Debug)]
pub struct FallbackCatalog {
    seeds: Vec<ResourceDescriptor>,
    offset: AtomicUsize,
}

impl FallbackCatalog {
    pub fn new(seeds: Vec<ResourceDescriptor>) -> Result<Self> {
        let mut ids = HashSet::new();
        let seeds: Vec<_> = seeds
            .into_iter()
            .filter(|d| ids.insert(d.id().to_string()))
            .collect();

        if seeds.is_empty() {
            error!("Fallback catalog has no entries");
            return Err(WallfeedError::CatalogExhausted);
        }

        Ok(Self {
            seeds,
            offset: AtomicUsize::new(0),
        })
    }

    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Result<Self> {
        let seeds = urls
            .iter()
            .filter_map(|url| {
                let url = url.as_ref();
                let descriptor = ResourceDescriptor::from_image_url(url);
                if descriptor.is_none() {
                    warn!("Ignoring fallback url without a file name: {}", url);
                }
                descriptor
            })
            .collect();
        Self::new(seeds)
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Up to `count` distinct seeds, continuing where the last call stopped.
    pub fn get(&self, count: usize) -> Vec<ResourceDescriptor> {
        let take = count.min(self.seeds.len());
        let start = self.offset.fetch_add(take, Ordering::Relaxed) % self.seeds.len();
        self.seeds
            .iter()
            .cycle()
            .skip(start)
            .take(take)
            .cloned()
            .collect()
    }

    /// Like [`FallbackCatalog::get`], skipping seeds for which `seen` is true.
    ///
    /// Walks the catalog at most once from the current offset, so the result
    /// is empty only when every seed has been seen.
    pub fn get_unseen(&self, count: usize, seen: impl Fn(&str) -> bool) -> Vec<ResourceDescriptor> {
        let len = self.seeds.len();
        let start = self.offset.load(Ordering::Relaxed) % len;
        let mut picked = Vec::new();
        let mut walked = 0;

        for seed in self.seeds.iter().cycle().skip(start).take(len) {
            if picked.len() >= count {
                break;
            }
            walked += 1;
            if !seen(seed.id()) {
                picked.push(seed.clone());
            }
        }

        self.offset.fetch_add(walked, Ordering::Relaxed);
        picked
    }

    pub fn reset(&self) {
        self.offset.store(0, Ordering::Relaxed);
    }
}

impl Default for FallbackCatalog {
    fn default() -> Self {
        Self {
            seeds: DEFAULT_FALLBACK_URLS
                .iter()
                .filter_map(|url| ResourceDescriptor::from_image_url(url))
                .collect(),
            offset: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{descriptors, ids_of};

    #[test]
    fn test_default_catalog_has_ten_distinct_entries() {
        let catalog = FallbackCatalog::default();
        assert_eq!(catalog.len(), 10);
        let all = catalog.get(10);
        let unique: HashSet<_> = all.iter().map(|d| d.id().to_string()).collect();
        assert_eq!(unique.len(), 10);
        assert_eq!(all[0].id(), "wp2555030");
        assert_eq!(all[2].id(), "pexels-photo-1366919");
    }

    #[test]
    fn test_get_rotates_through_seeds() {
        let catalog = FallbackCatalog::new(descriptors([1, 2, 3, 4, 5])).unwrap();
        assert_eq!(ids_of(&catalog.get(2)), vec!["1", "2"]);
        assert_eq!(ids_of(&catalog.get(2)), vec!["3", "4"]);
        assert_eq!(ids_of(&catalog.get(2)), vec!["5", "1"]);
        catalog.reset();
        assert_eq!(ids_of(&catalog.get(1)), vec!["1"]);
    }

    #[test]
    fn test_get_unseen_skips_seen_seeds() {
        let catalog = FallbackCatalog::new(descriptors([1, 2, 3, 4, 5])).unwrap();
        let seen = ["1", "2", "4"];
        let fresh = catalog.get_unseen(2, |id| seen.contains(&id));
        assert_eq!(ids_of(&fresh), vec!["3", "5"]);

        let all_seen = catalog.get_unseen(2, |_| true);
        assert!(all_seen.is_empty());
    }

    #[test]
    fn test_get_caps_at_catalog_size() {
        let catalog = FallbackCatalog::new(descriptors([1, 2, 3])).unwrap();
        assert_eq!(catalog.get(20).len(), 3);
        assert!(catalog.get(0).is_empty());
    }

    #[test]
    fn test_empty_catalog_is_rejected() {
        assert!(matches!(
            FallbackCatalog::new(Vec::new()),
            Err(WallfeedError::CatalogExhausted)
        ));
        assert!(matches!(
            FallbackCatalog::from_urls(&["https://example.com/"]),
            Err(WallfeedError::CatalogExhausted)
        ));
    }

    #[test]
    fn test_duplicate_seeds_are_collapsed() {
        let catalog = FallbackCatalog::new(descriptors([1, 1, 2])).unwrap();
        assert_eq!(catalog.len(), 2);
    }
}
