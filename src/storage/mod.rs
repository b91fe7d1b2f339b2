//! Durable content cache and its storage backends.

mod backend;
mod cache;
mod memory;
mod sqlite;

pub use backend::{EntryMeta, StorageBackend, estimate_size};
pub use cache::{ContentCache, SharedCache, StorageInfo};
pub use memory::MemoryBackend;
pub use sqlite::{PoolConfig, SqliteBackend};
