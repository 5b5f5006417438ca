//! Stream cache (C3) and insert pipeline (C5): chunked per-substream logs
//! backed by [`dp_store`], plus the validation/restamp/size-limit layer
//! in front of them.

mod config;
mod error;
mod insert;
mod streamlog;

pub use config::{CacheConfig, InsertPipelineConfig, RestampMode};
pub use error::{CacheError, LimitScope};
pub use insert::{EmitSink, InsertOutcome, InsertPipeline};
pub use streamlog::{
    byte_size, delete_stream, delete_substream, device_byte_size, first_cached_index, get, insert,
    last_timestamp, range, stream_length, trim, RangeResult,
};
