use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Failure of a [`crate::MemoCache`] lookup. Producer failures are never cached.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Producer failed: {0}")]
    Producer(E),
}
