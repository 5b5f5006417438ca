use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// Identifies one ordered log: a device, a stream within it, and an
/// optional substream. `""` for any component is valid — the empty
/// substream is the primary log of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstreamKey {
    pub device: String,
    pub stream: String,
    pub substream: String,
}

impl SubstreamKey {
    pub fn new(device: impl Into<String>, stream: impl Into<String>, substream: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            stream: stream.into(),
            substream: substream.into(),
        }
    }

    /// The meta-hash / chunk-list key: `{device}stream:substream`.
    pub fn meta_key(&self) -> String {
        format!("{{{}}}{}:{}", self.device, self.stream, self.substream)
    }

    /// The device-wide routing tag: `{device}`, used as the device counter
    /// hash name.
    pub fn device_key(&self) -> String {
        format!("{{{}}}", self.device)
    }
}

/// A locator for one chunk of a substream's log, by absolute index range
/// `[start, end)`. Canonical string form: `{device}stream:substream:start:end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub key: SubstreamKey,
    pub start: u64,
    pub end: u64,
}

impl ChunkDescriptor {
    pub fn encode(&self) -> String {
        format!(
            "{{{}}}{}:{}:{}:{}",
            self.key.device, self.key.stream, self.key.substream, self.start, self.end
        )
    }

    pub fn parse(s: &str) -> Result<Self, CodecError> {
        let rest = s
            .strip_prefix('{')
            .ok_or_else(|| CodecError::Decode(format!("chunk descriptor missing '{{': {s}")))?;
        let close = rest
            .find('}')
            .ok_or_else(|| CodecError::Decode(format!("chunk descriptor missing '}}': {s}")))?;
        let device = &rest[..close];
        let remainder = &rest[close + 1..];

        let mut parts = remainder.rsplitn(3, ':');
        let end_str = parts
            .next()
            .ok_or_else(|| CodecError::Decode(format!("chunk descriptor missing end: {s}")))?;
        let start_str = parts
            .next()
            .ok_or_else(|| CodecError::Decode(format!("chunk descriptor missing start: {s}")))?;
        let stream_substream = parts
            .next()
            .ok_or_else(|| CodecError::Decode(format!("chunk descriptor missing stream:substream: {s}")))?;

        let (stream, substream) = stream_substream
            .split_once(':')
            .ok_or_else(|| CodecError::Decode(format!("chunk descriptor missing substream separator: {s}")))?;

        let start: u64 = start_str
            .parse()
            .map_err(|_| CodecError::Decode(format!("invalid start index: {s}")))?;
        let end: u64 = end_str
            .parse()
            .map_err(|_| CodecError::Decode(format!("invalid end index: {s}")))?;

        Ok(Self {
            key: SubstreamKey::new(device, stream, substream),
            start,
            end,
        })
    }
}
