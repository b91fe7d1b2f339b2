//! Storage backend abstraction for the content cache.

use crate::constants::cache::BYTES_PER_CODE_UNIT;
use crate::types::Result;

/// Metadata of one stored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub key: String,
    /// Estimated size in bytes (see [`estimate_size`])
    pub size: usize,
    /// Monotonic write sequence; larger is newer
    pub seq: u64,
}

/// Raw key-value persistence with a hard capacity
///
/// Implementations must reject a `put` that would push total usage above
/// `capacity()` with [`crate::types::LessonError::QuotaExceeded`], leaving
/// the previous value (if any) untouched.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite; `size` is the caller's estimate for key + value
    fn put(&self, key: &str, value: &str, size: usize) -> Result<()>;

    fn remove(&self, key: &str) -> Result<bool>;

    /// All entries, oldest write first
    fn entries(&self) -> Result<Vec<EntryMeta>>;

    /// Sum of entry sizes
    fn used_bytes(&self) -> Result<usize>;

    fn capacity(&self) -> usize;

    /// Remove everything; returns the number of entries removed
    fn clear(&self) -> Result<usize>;
}

/// Size estimate of an entry: UTF-16 code units of key and value, 2 bytes each
pub fn estimate_size(key: &str, value: &str) -> usize {
    (key.encode_utf16().count() + value.encode_utf16().count()) * BYTES_PER_CODE_UNIT
}
