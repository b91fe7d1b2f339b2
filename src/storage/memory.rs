//! In-process storage backend for tests and `--no-cache`-style ephemeral runs.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::backend::{EntryMeta, StorageBackend};
use crate::types::{LessonError, Result};

#[derive(Debug, Clone)]
struct Stored {
    value: String,
    size: usize,
    seq: u64,
}

/// Capacity-bounded map
#[derive(Debug)]
pub struct MemoryBackend {
    entries: DashMap<String, Stored>,
    next_seq: AtomicU64,
    capacity: usize,
}

impl MemoryBackend {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(1),
            capacity,
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    fn put(&self, key: &str, value: &str, size: usize) -> Result<()> {
        let existing = self.entries.get(key).map(|e| e.size).unwrap_or(0);
        let used = self.used_bytes()? - existing;

        if used + size > self.capacity {
            return Err(LessonError::QuotaExceeded {
                requested: size,
                available: self.capacity.saturating_sub(used),
            });
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(
            key.to_string(),
            Stored {
                value: value.to_string(),
                size,
                seq,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn entries(&self) -> Result<Vec<EntryMeta>> {
        let mut entries: Vec<EntryMeta> = self
            .entries
            .iter()
            .map(|e| EntryMeta {
                key: e.key().clone(),
                size: e.size,
                seq: e.seq,
            })
            .collect();
        entries.sort_by_key(|e| e.seq);
        Ok(entries)
    }

    fn used_bytes(&self) -> Result<usize> {
        Ok(self.entries.iter().map(|e| e.size).sum())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) -> Result<usize> {
        let count = self.entries.len();
        self.entries.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let backend = MemoryBackend::new(100);
        backend.put("a", "1", 4).unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(backend.used_bytes().unwrap(), 4);
        assert!(backend.remove("a").unwrap());
        assert!(!backend.remove("a").unwrap());
        assert_eq!(backend.get("a").unwrap(), None);
    }

    #[test]
    fn test_quota_exceeded_keeps_old_value() {
        let backend = MemoryBackend::new(10);
        backend.put("a", "old", 8).unwrap();
        backend.put("b", "x", 2).unwrap();

        let err = backend.put("c", "y", 4).unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(backend.get("c").unwrap(), None);

        // Overwrite only counts the delta
        backend.put("a", "new", 8).unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_entries_in_write_order() {
        let backend = MemoryBackend::new(100);
        backend.put("z", "1", 2).unwrap();
        backend.put("a", "2", 2).unwrap();
        backend.put("z", "3", 2).unwrap();

        let keys: Vec<_> = backend.entries().unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["a", "z"]);
    }
}
