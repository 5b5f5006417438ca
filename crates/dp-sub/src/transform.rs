//! Pre-compiled transform handles and the message envelope they produce.
//!
//! Parsing/evaluating a transform expression is out of scope here — the
//! cache only ever sees an opaque, already-compiled handle alongside the
//! expression string used to key it for dedup/removal.

use dp_codec::DatapointArray;
use std::sync::Arc;

/// A compiled transform: takes the inserted array, returns a possibly
/// empty output array. Must be synchronous and side-effect free — it runs
/// under the subscription's transform-map lock.
pub type TransformHandle = Arc<dyn Fn(&DatapointArray) -> DatapointArray + Send + Sync>;

/// One message delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub stream: String,
    pub substream: String,
    /// The expression that produced this envelope; `""` for the
    /// pass-through entry.
    pub transform: String,
    pub data: DatapointArray,
}
