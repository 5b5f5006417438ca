use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shard worker is no longer running")]
    ShardClosed,
}
