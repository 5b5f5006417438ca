use thiserror::Error;

/// Which side of a size limit tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Device,
    Stream,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("timestamp is not monotonically non-decreasing")]
    Timestamp,
    #[error("{scope:?} size limit exceeded")]
    SizeLimit { scope: LimitScope },
    #[error("invalid range")]
    InvalidRange,
    #[error("invalid key")]
    InvalidKey,
    #[error("store error: {0}")]
    Store(String),
}

impl From<dp_store::StoreError> for CacheError {
    fn from(e: dp_store::StoreError) -> Self {
        CacheError::Store(e.to_string())
    }
}

impl From<dp_codec::CodecError> for CacheError {
    fn from(e: dp_codec::CodecError) -> Self {
        CacheError::Store(e.to_string())
    }
}
