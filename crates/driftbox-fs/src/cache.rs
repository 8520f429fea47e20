//! Per-parent TTL cache of folder/file listings.
//!
//! Reads clone the cached `Vec` out from under the lock so decoding never
//! happens while holding it; mutations invalidate by parent id.

use driftbox_core::types::{FileHandle, FolderHandle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry<T> {
    items: T,
    inserted_at: Instant,
}

/// Listing cache shared by the path resolver and the batch controller's
/// remote-tree walks. One instance per process.
pub struct ListingCache {
    folders: Mutex<HashMap<String, CacheEntry<Vec<FolderHandle>>>>,
    files: Mutex<HashMap<String, CacheEntry<Vec<FileHandle>>>>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            folders: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get_folders(&self, parent_id: &str) -> Option<Vec<FolderHandle>> {
        let map = self.folders.lock().expect("listing cache lock poisoned");
        map.get(parent_id).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.items.clone())
            } else {
                None
            }
        })
    }

    pub fn get_files(&self, parent_id: &str) -> Option<Vec<FileHandle>> {
        let map = self.files.lock().expect("listing cache lock poisoned");
        map.get(parent_id).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.items.clone())
            } else {
                None
            }
        })
    }

    pub fn put_folders(&self, parent_id: &str, items: Vec<FolderHandle>) {
        let mut map = self.folders.lock().expect("listing cache lock poisoned");
        map.insert(
            parent_id.to_string(),
            CacheEntry {
                items,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn put_files(&self, parent_id: &str, items: Vec<FileHandle>) {
        let mut map = self.files.lock().expect("listing cache lock poisoned");
        map.insert(
            parent_id.to_string(),
            CacheEntry {
                items,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop both the folder and file entries for a parent. Callers invoke
    /// this for every parent touched by a mutation (source *and*
    /// destination for moves/renames).
    pub fn invalidate(&self, parent_id: &str) {
        self.folders
            .lock()
            .expect("listing cache lock poisoned")
            .remove(parent_id);
        self.files
            .lock()
            .expect("listing cache lock poisoned")
            .remove(parent_id);
        tracing::debug!(parent_id, "listing cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str, parent: &str, name: &str) -> FolderHandle {
        FolderHandle {
            id: id.into(),
            parent_id: Some(parent.into()),
            name: name.into(),
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = ListingCache::new(Duration::from_secs(60));
        assert!(cache.get_folders("root").is_none());
        cache.put_folders("root", vec![folder("f1", "root", "docs")]);
        let hit = cache.get_folders("root").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "docs");
    }

    #[test]
    fn expired_entry_is_treated_as_absent() {
        let cache = ListingCache::new(Duration::from_millis(1));
        cache.put_folders("root", vec![folder("f1", "root", "docs")]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_folders("root").is_none());
    }

    #[test]
    fn invalidate_clears_both_maps() {
        let cache = ListingCache::new(Duration::from_secs(60));
        cache.put_folders("p", vec![folder("f1", "p", "a")]);
        cache.put_files("p", vec![]);
        cache.invalidate("p");
        assert!(cache.get_folders("p").is_none());
        assert!(cache.get_files("p").is_none());
    }
}
