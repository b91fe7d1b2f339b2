//! Content Cache
//!
//! Size-bounded key-value cache shared by every pipeline stage.
//!
//! ## Rules
//!
//! - Entry size is estimated as UTF-16 code units of key + value, 2 bytes each
//! - Entries above the per-item ceiling are rejected outright
//! - Before a write, if projected usage passes the eviction threshold,
//!   entries are evicted by ascending rank until it no longer does
//! - Rank is the trailing numeric token after the key's last `-`
//!   (0 when absent); ties go to the oldest write
//! - A backend quota error triggers one eviction pass and exactly one retry
//!
//! Failures are logged and reported as `false`/`None`, never as errors:
//! a broken cache must not break generation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::backend::{EntryMeta, StorageBackend, estimate_size};
use super::memory::MemoryBackend;
use super::sqlite::SqliteBackend;
use crate::config::{CacheBackendKind, CacheConfig, ConfigLoader};
use crate::types::{LessonError, Result};

/// Snapshot of cache usage
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StorageInfo {
    pub used_bytes: usize,
    pub total_bytes: usize,
    pub percentage_used: f64,
}

pub type SharedCache = Arc<ContentCache>;

pub struct ContentCache {
    backend: Box<dyn StorageBackend>,
    max_item_bytes: usize,
    eviction_threshold: f64,
    /// Serializes the evict-then-write sequence
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("capacity", &self.backend.capacity())
            .field("max_item_bytes", &self.max_item_bytes)
            .field("eviction_threshold", &self.eviction_threshold)
            .finish()
    }
}

impl ContentCache {
    pub fn new(
        backend: Box<dyn StorageBackend>,
        max_item_bytes: usize,
        eviction_threshold: f64,
    ) -> Self {
        Self {
            backend,
            max_item_bytes,
            eviction_threshold,
            write_lock: Mutex::new(()),
        }
    }

    /// Open the backend named by the configuration
    pub fn open(config: &CacheConfig) -> Result<Self> {
        let backend: Box<dyn StorageBackend> = match config.backend {
            CacheBackendKind::Memory => Box::new(MemoryBackend::new(config.capacity_bytes)),
            CacheBackendKind::Sqlite => {
                let path = config
                    .path
                    .clone()
                    .unwrap_or_else(ConfigLoader::default_cache_path);
                debug!("Opening cache at {}", path.display());
                Box::new(SqliteBackend::open(path, config.capacity_bytes)?)
            }
        };

        Ok(Self::new(
            backend,
            config.max_item_bytes,
            config.eviction_threshold,
        ))
    }

    /// Ephemeral cache with the given capacity settings
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(
            Box::new(MemoryBackend::new(config.capacity_bytes)),
            config.max_item_bytes,
            config.eviction_threshold,
        )
    }

    /// Location of the SQLite file a config would use
    pub fn resolved_path(config: &CacheConfig) -> Option<PathBuf> {
        match config.backend {
            CacheBackendKind::Memory => None,
            CacheBackendKind::Sqlite => Some(
                config
                    .path
                    .clone()
                    .unwrap_or_else(ConfigLoader::default_cache_path),
            ),
        }
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    pub fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache read failed for '{}': {}", key, e);
                None
            }
        }
    }

    /// Store `value` under `key`; `false` when rejected or the write failed
    pub fn set(&self, key: &str, value: &str) -> bool {
        let size = estimate_size(key, value);
        if size > self.max_item_bytes {
            warn!(
                "Cache item '{}' rejected: {} bytes exceeds the {} byte ceiling",
                key, size, self.max_item_bytes
            );
            return false;
        }

        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Err(e) = self.evict_for(key, size) {
            warn!("Cache eviction failed: {}", e);
        }

        match self.backend.put(key, value, size) {
            Ok(()) => true,
            Err(e) if e.is_quota_exceeded() => {
                warn!("Cache quota exceeded writing '{}', evicting and retrying", key);
                if let Err(e) = self.evict_for(key, size) {
                    warn!("Cache eviction failed: {}", e);
                }
                match self.backend.put(key, value, size) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Cache write for '{}' failed after retry: {}", key, e);
                        false
                    }
                }
            }
            Err(e) => {
                warn!("Cache write for '{}' failed: {}", key, e);
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!("Cache remove failed for '{}': {}", key, e);
        }
    }

    pub fn has_item(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys starting with `prefix`, oldest write first
    pub fn keys_by_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.entries() {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| e.key.starts_with(prefix))
                .map(|e| e.key)
                .collect(),
            Err(e) => {
                warn!("Cache key listing failed: {}", e);
                Vec::new()
            }
        }
    }

    pub fn storage_info(&self) -> StorageInfo {
        let used_bytes = self.backend.used_bytes().unwrap_or_else(|e| {
            warn!("Cache usage query failed: {}", e);
            0
        });
        let total_bytes = self.backend.capacity();
        let percentage_used = if total_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 * 100.0 / total_bytes as f64
        };

        StorageInfo {
            used_bytes,
            total_bytes,
            percentage_used,
        }
    }

    /// Remove every key starting with `prefix`; returns how many were removed
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let removed = self
            .keys_by_prefix(prefix)
            .iter()
            .filter(|key| self.backend.remove(key).unwrap_or(false))
            .count();
        info!("Cleared {} cache entries with prefix '{}'", removed, prefix);
        removed
    }

    pub fn clear(&self) -> usize {
        match self.backend.clear() {
            Ok(count) => {
                info!("Cleared {} cache entries", count);
                count
            }
            Err(e) => {
                warn!("Cache clear failed: {}", e);
                0
            }
        }
    }

    // =========================================================================
    // Typed Helpers
    // =========================================================================

    /// Deserialize a cached JSON value; undecodable entries read as a miss
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry '{}': {}", key, e);
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(e) => {
                warn!("Cache serialization failed for '{}': {}", key, e);
                false
            }
        }
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Evict until writing `size` bytes under `key` stays within the threshold
    fn evict_for(&self, key: &str, size: usize) -> Result<usize> {
        let limit = (self.backend.capacity() as f64 * self.eviction_threshold) as usize;
        let entries = self.backend.entries()?;

        let existing = entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.size)
            .unwrap_or(0);
        let used: usize = entries.iter().map(|e| e.size).sum();
        let mut projected = used - existing + size;

        if projected <= limit {
            return Ok(0);
        }

        let mut candidates: Vec<&EntryMeta> = entries.iter().filter(|e| e.key != key).collect();
        candidates.sort_by_key(|e| (eviction_rank(&e.key), e.seq));

        let mut evicted = 0;
        for entry in candidates {
            if projected <= limit {
                break;
            }
            if self.backend.remove(&entry.key)? {
                projected = projected.saturating_sub(entry.size);
                evicted += 1;
                debug!("Evicted cache entry '{}' ({} bytes)", entry.key, entry.size);
            }
        }

        if evicted > 0 {
            warn!(
                "Evicted {} cache entries; projected usage {} of {} bytes",
                evicted,
                projected,
                self.backend.capacity()
            );
        }

        if projected > limit {
            return Err(LessonError::Storage(format!(
                "Could not free enough space: projected {} bytes exceeds limit {}",
                projected, limit
            )));
        }

        Ok(evicted)
    }
}

/// Trailing numeric token after the last `-`; 0 when absent
fn eviction_rank(key: &str) -> u64 {
    key.rsplit('-')
        .next()
        .and_then(|token| token.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PageContent, Quiz, QuizQuestion};
    use tempfile::TempDir;

    const MIB: usize = 1024 * 1024;

    fn memory_cache() -> ContentCache {
        ContentCache::in_memory(&CacheConfig::default())
    }

    /// Value whose entry with `key` is exactly `bytes` bytes
    fn value_of_size(key: &str, bytes: usize) -> String {
        "x".repeat(bytes / 2 - key.len())
    }

    #[test]
    fn test_eviction_rank() {
        assert_eq!(eviction_rank("refined-photosynthesis-1700000000"), 1_700_000_000);
        assert_eq!(eviction_rank("page-x-3-Intro"), 0);
        assert_eq!(eviction_rank("plain"), 0);
    }

    #[test]
    fn test_set_get_remove() {
        let cache = memory_cache();
        assert!(cache.set("refined-a", "A detailed prompt"));
        assert!(cache.has_item("refined-a"));
        assert_eq!(cache.get("refined-a").as_deref(), Some("A detailed prompt"));

        cache.remove("refined-a");
        assert!(!cache.has_item("refined-a"));
    }

    #[test]
    fn test_item_ceiling_rejects_and_stores_nothing() {
        let cache = memory_cache();
        // (4 + 524_285) * 2 = 1_048_578 > 1 MiB
        let key = "big!";
        let value = "v".repeat(MIB / 2 - 3);
        assert!(!cache.set(key, &value));
        assert!(!cache.has_item(key));
        assert_eq!(cache.storage_info().used_bytes, 0);

        // Exactly at the ceiling is accepted
        let value = "v".repeat(MIB / 2 - 4);
        assert!(cache.set(key, &value));
    }

    #[test]
    fn test_eviction_frees_oldest_ranked_entries() {
        let cache = memory_cache();
        let capacity = 5 * MIB;
        let limit = (capacity as f64 * 0.9) as usize;

        // Five ~0.9 MiB entries = 4.5 MiB, right at the 90% line
        let entry_size = limit / 5;
        for rank in [50u32, 10, 40, 20, 30] {
            let key = format!("content-topic-{}", rank);
            assert!(cache.set(&key, &value_of_size(&key, entry_size)));
        }
        assert!(cache.storage_info().used_bytes <= limit);

        assert!(cache.set("refined-new-60", "small"));

        // Lowest rank went first; everything else survives
        assert!(!cache.has_item("content-topic-10"));
        for rank in [20, 30, 40, 50] {
            assert!(cache.has_item(&format!("content-topic-{}", rank)));
        }
        assert!(cache.has_item("refined-new-60"));
        assert!(cache.storage_info().used_bytes <= limit);
    }

    #[test]
    fn test_eviction_ties_broken_by_write_order() {
        let cache = ContentCache::in_memory(&CacheConfig {
            capacity_bytes: 100,
            max_item_bytes: 100,
            eviction_threshold: 0.9,
            ..Default::default()
        });

        // Non-numeric suffixes all rank 0
        // Each entry is (6 + 9) * 2 = 30 bytes; three fill the 90 byte limit
        assert!(cache.set("page-a", "123456789"));
        assert!(cache.set("page-b", "123456789"));
        assert!(cache.set("page-c", "123456789"));

        assert!(cache.set("page-d", "123456789"));
        assert!(!cache.has_item("page-a"));
        assert!(cache.has_item("page-b"));
        assert!(cache.has_item("page-c"));
        assert!(cache.has_item("page-d"));
    }

    #[test]
    fn test_keys_by_prefix_and_clear_prefix() {
        let cache = memory_cache();
        cache.set("page-x-1", "a");
        cache.set("page-x-2", "b");
        cache.set("content-x", "c");

        assert_eq!(cache.keys_by_prefix("page-"), vec!["page-x-1", "page-x-2"]);
        assert_eq!(cache.clear_prefix("page-"), 2);
        assert!(cache.keys_by_prefix("page-").is_empty());
        assert!(cache.has_item("content-x"));
        assert_eq!(cache.clear(), 1);
    }

    #[test]
    fn test_storage_info_percentage() {
        let cache = ContentCache::in_memory(&CacheConfig {
            capacity_bytes: 200,
            max_item_bytes: 200,
            ..Default::default()
        });
        cache.set("ab", "cdefgh");
        let info = cache.storage_info();
        assert_eq!(info.used_bytes, 16);
        assert_eq!(info.total_bytes, 200);
        assert!((info.percentage_used - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_page_content_json_round_trip_on_sqlite() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ContentCache::open(&CacheConfig {
            path: Some(temp_dir.path().join("cache.db")),
            ..Default::default()
        })
        .unwrap();

        let page = PageContent {
            page: 2,
            title: "Leaves".to_string(),
            raw_content: "<p class=\"lesson-text\">Leaves are green.</p>".to_string(),
            refined_content: Some("<p class=\"lesson-text\">Leaves look green.</p>".to_string()),
            quiz: Some(Quiz {
                quiz_title: "Leaves".to_string(),
                quiz_synopsis: "Check yourself".to_string(),
                progress_bar_color: "#9de1f6".to_string(),
                nr_of_questions: "1".to_string(),
                questions: vec![QuizQuestion {
                    question: "Colour?".to_string(),
                    question_type: "text".to_string(),
                    answer_selection_type: "single".to_string(),
                    answers: vec!["Green".into(), "Red".into(), "Blue".into(), "Pink".into()],
                    correct_answer: "1".to_string(),
                    message_for_correct_answer: "Yes".to_string(),
                    message_for_incorrect_answer: "No".to_string(),
                    explanation: "Chlorophyll".to_string(),
                    point: "10".to_string(),
                }],
            }),
        };

        let key = "page-plants-school-kid-concise-2-Leaves";
        assert!(cache.set_json(key, &page));
        let restored: PageContent = cache.get_json(key).unwrap();
        assert_eq!(restored, page);
    }

    #[test]
    fn test_undecodable_json_is_a_miss() {
        let cache = memory_cache();
        cache.set("content-broken", "{not json");
        assert!(cache.get_json::<PageContent>("content-broken").is_none());
    }

    /// Backend whose first write always reports quota exhaustion
    struct FlakyQuota {
        inner: MemoryBackend,
        failures: std::sync::atomic::AtomicUsize,
    }

    impl StorageBackend for FlakyQuota {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }
        fn put(&self, key: &str, value: &str, size: usize) -> Result<()> {
            use std::sync::atomic::Ordering;
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(LessonError::QuotaExceeded {
                    requested: size,
                    available: 0,
                });
            }
            self.inner.put(key, value, size)
        }
        fn remove(&self, key: &str) -> Result<bool> {
            self.inner.remove(key)
        }
        fn entries(&self) -> Result<Vec<EntryMeta>> {
            self.inner.entries()
        }
        fn used_bytes(&self) -> Result<usize> {
            self.inner.used_bytes()
        }
        fn capacity(&self) -> usize {
            self.inner.capacity()
        }
        fn clear(&self) -> Result<usize> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_quota_error_retried_exactly_once() {
        let flaky = |failures| {
            ContentCache::new(
                Box::new(FlakyQuota {
                    inner: MemoryBackend::new(1024),
                    failures: std::sync::atomic::AtomicUsize::new(failures),
                }),
                1024,
                0.9,
            )
        };

        assert!(flaky(1).set("k", "v"));
        assert!(!flaky(2).set("k", "v"));
    }
}
