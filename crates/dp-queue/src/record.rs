//! Checksummed wire record for a chunk descriptor.
//!
//! The in-memory batcher lists this crate maintains are volatile (the
//! cache itself carries no durability guarantee beyond process lifetime),
//! but every descriptor is still framed with a CRC32 the way the original
//! WAL record format did, so a corrupted in-flight entry is caught at
//! decode time rather than handed to a persister as if it were valid.

use dp_codec::ChunkDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("malformed descriptor record: {0}")]
    Malformed(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRecord {
    descriptor: String,
    checksum: u32,
}

pub fn encode(descriptor: &ChunkDescriptor) -> Vec<u8> {
    let encoded = descriptor.encode();
    let checksum = crc32fast::hash(encoded.as_bytes());
    bincode::serialize(&WireRecord { descriptor: encoded, checksum }).expect("record serialization is infallible")
}

pub fn decode(bytes: &[u8]) -> Result<ChunkDescriptor, RecordError> {
    let record: WireRecord =
        bincode::deserialize(bytes).map_err(|e| RecordError::Malformed(e.to_string()))?;
    let actual = crc32fast::hash(record.descriptor.as_bytes());
    if actual != record.checksum {
        return Err(RecordError::ChecksumMismatch { expected: record.checksum, actual });
    }
    ChunkDescriptor::parse(&record.descriptor).map_err(|e| RecordError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_codec::SubstreamKey;

    #[test]
    fn round_trips() {
        let desc = ChunkDescriptor { key: SubstreamKey::new("", "mystream", ""), start: 0, end: 2 };
        let bytes = encode(&desc);
        assert_eq!(decode(&bytes).unwrap(), desc);
    }

    #[test]
    fn detects_corruption() {
        let desc = ChunkDescriptor { key: SubstreamKey::new("", "mystream", ""), start: 0, end: 2 };
        let mut bytes = encode(&desc);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(decode(&bytes).is_err());
    }
}
