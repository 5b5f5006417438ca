//! Streaming datapoint cache (C7): the one public entry point composing
//! [`dp_store`]'s per-device shards, [`dp_cache`]'s chunked logs and insert
//! pipeline, [`dp_queue`]'s durable batch queue, and [`dp_sub`]'s
//! subscription fan-out.
//!
//! Callers never construct the lower crates' internals directly — every
//! operation here is the façade named in the operation list: `Insert`,
//! `Get`, `Range`, `StreamLength`, `TrimStream`, `Delete{Substream,Stream,
//! Hash}`, `HashSize`, `StreamSize`, `NextBatch`, `ReadBatch`.

mod error;
mod facade;

pub use dp_cache::{CacheConfig, InsertPipelineConfig, RangeResult, RestampMode};
pub use dp_codec::{ChunkDescriptor, Datapoint, DatapointArray, SubstreamKey, Value};
pub use dp_queue::ReadBatchResult;
pub use dp_sub::{Envelope, StreamExt, SubConfig, SubError, TransformHandle};
pub use error::FacadeError;
pub use facade::Cache;
