//! Generic scripted key/value engine behind the datapoint cache.
//!
//! Knows nothing about datapoints, chunking, or batching — it provides
//! hash fields and lists, sharded per device so that multi-key mutations
//! against one device run to completion before the next is admitted,
//! without a process-wide lock.

mod error;
mod hash;
mod list;
mod shard;

pub use error::StoreError;
pub use hash::{FieldValue, HashStore};
pub use list::ListStore;
pub use shard::{Shard, ShardRegistry, ShardState};
