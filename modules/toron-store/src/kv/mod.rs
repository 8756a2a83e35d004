// Key-value store seam. Values are opaque bytes; typing and key prefixes
// live in `Collection`.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;

use crate::error::Result;

/// One page of a prefix scan. `cursor` is `None` once iteration is complete.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub entries: Vec<(String, Vec<u8>)>,
    pub cursor: Option<String>,
}

/// Batch calls carry no cross-key atomicity; each is equivalent to the
/// corresponding sequence of single-key calls.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Values in the same order as `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn mset(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Number of keys that existed and were removed.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// Whether every key in `keys` is present.
    async fn exists(&self, keys: &[String]) -> Result<bool>;

    /// Resume a scan over keys starting with `prefix`. Pass `None` to start.
    async fn scan(&self, prefix: &str, cursor: Option<&str>, count: usize) -> Result<ScanPage>;

    /// Commit buffered writes. Backends that write through need not override.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
