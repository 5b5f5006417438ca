use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cold store append failed: {0}")]
    Append(String),
    #[error("cold store read failed: {0}")]
    Read(String),
    #[error(transparent)]
    Queue(#[from] dp_queue::QueueError),
    #[error(transparent)]
    Cache(#[from] dp_cache::CacheError),
    #[error(transparent)]
    Store(#[from] dp_store::StoreError),
}
