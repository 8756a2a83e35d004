pub mod cache;
pub mod codec;
pub mod collection;
pub mod error;
pub mod kv;
pub mod records;
pub mod repository;

pub use cache::{MemoCache, Producer};
pub use codec::{decode, decode_any, decode_with, encode, Codable};
pub use collection::Collection;
pub use error::{CacheError, CodecError, Result, StoreError};
pub use kv::{KeyValueStore, MemoryStore, RedisStore, ScanPage};
pub use records::ShowRef;
pub use repository::Repository;
