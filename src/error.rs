use thiserror::Error;

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Cache(#[from] dp_cache::CacheError),
    #[error(transparent)]
    Queue(#[from] dp_queue::QueueError),
}
