//! Binary codec for the streaming datapoint cache.
//!
//! Defines the datapoint payload type ([`Value`]), the timestamped point
//! and array types ([`Datapoint`], [`DatapointArray`]), and a length-prefixed
//! binary framing ([`mod@codec`]) that lets callers slice consecutive
//! encoded arrays out of a buffer without decoding each one.

mod codec;
mod datapoint;
mod error;
mod key;
mod value;

pub use codec::{decode_array, decode_datapoint, encode_array, encode_datapoint, peek_array_header, ArrayHeader};
pub use datapoint::{Datapoint, DatapointArray};
pub use error::CodecError;
pub use key::{ChunkDescriptor, SubstreamKey};
pub use value::Value;
