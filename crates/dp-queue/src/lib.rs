//! Batch queue (C4): the handoff between the cache's chunked logs and a
//! cold-storage persister.
//!
//! Descriptors are published here the moment their chunk closes and stay
//! device-agnostic — unlike [`dp_cache`]'s per-device shards, the lists in
//! this crate are addressed purely by batcher tag.

mod batcher;
mod read_batch;
mod record;

pub use batcher::{BatchQueue, QueueError};
pub use read_batch::{read_batch, ReadBatchResult};
pub use record::RecordError;
