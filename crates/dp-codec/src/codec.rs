//! Length-prefixed binary framing for datapoint arrays.
//!
//! Every encoded `DatapointArray` is prefixed with an [`ArrayHeader`] giving
//! the element count and the byte length of the body that follows, so a
//! caller holding a byte buffer spanning several concatenated arrays can
//! skip to the next one in O(1) without decoding the body.

use crate::datapoint::{Datapoint, DatapointArray};
use crate::error::CodecError;

const HEADER_LEN: usize = 8;

/// Count + byte length of an encoded array body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayHeader {
    pub count: u32,
    pub byte_len: u32,
}

impl ArrayHeader {
    fn write_to(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.byte_len.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Decode("buffer shorter than header".into()));
        }
        let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let byte_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        Ok(Self { count, byte_len })
    }
}

/// Encodes a single datapoint using `bincode`'s canonical little-endian
/// format (the same wire format the durable batch queue uses for its
/// descriptor records).
pub fn encode_datapoint(dp: &Datapoint) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(dp).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn decode_datapoint(bytes: &[u8]) -> Result<Datapoint, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Encodes a `DatapointArray` as `[ArrayHeader][bincode body]`.
pub fn encode_array(arr: &DatapointArray) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(arr.as_slice()).map_err(|e| CodecError::Encode(e.to_string()))?;
    let header = ArrayHeader {
        count: arr.len() as u32,
        byte_len: body.len() as u32,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    header.write_to(&mut out);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes a framed array, returning the array and the number of bytes
/// consumed from `bytes` (header + body), so callers can slice past it.
pub fn decode_array(bytes: &[u8]) -> Result<(DatapointArray, usize), CodecError> {
    let header = ArrayHeader::read_from(bytes)?;
    let body_start = HEADER_LEN;
    let body_end = body_start + header.byte_len as usize;
    if bytes.len() < body_end {
        return Err(CodecError::TruncatedArray {
            declared: header.byte_len,
            available: (bytes.len() - body_start.min(bytes.len())) as u32,
        });
    }
    let points: Vec<Datapoint> = bincode::deserialize(&bytes[body_start..body_end])
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok((DatapointArray::from_vec(points), body_end))
}

/// Reads only the header, without decoding the body — used when a caller
/// only needs the element count (e.g. to check it against a script-item
/// limit before deciding whether to split an insert).
pub fn peek_array_header(bytes: &[u8]) -> Result<ArrayHeader, CodecError> {
    ArrayHeader::read_from(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn sample_array() -> DatapointArray {
        DatapointArray::from_vec(vec![
            Datapoint::new(1.0, 1.0, ""),
            Datapoint::new(2.0, "hello", "alice"),
            Datapoint::new(3.0, Value::Bool(true), ""),
            Datapoint::new(
                4.0,
                Value::Map(vec![("x".into(), Value::Number(1.0))]),
                "",
            ),
        ])
    }

    #[test]
    fn round_trips_mixed_shapes() {
        let arr = sample_array();
        let encoded = encode_array(&arr).unwrap();
        let (decoded, consumed) = decode_array(&encoded).unwrap();
        assert_eq!(decoded, arr);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn header_reports_element_count() {
        let arr = sample_array();
        let encoded = encode_array(&arr).unwrap();
        let header = peek_array_header(&encoded).unwrap();
        assert_eq!(header.count, arr.len() as u32);
    }

    #[test]
    fn concatenated_arrays_are_independently_sliceable() {
        let a = sample_array();
        let b = DatapointArray::from_vec(vec![Datapoint::new(5.0, 5.0, "")]);
        let mut buf = encode_array(&a).unwrap();
        buf.extend_from_slice(&encode_array(&b).unwrap());

        let (decoded_a, consumed_a) = decode_array(&buf).unwrap();
        assert_eq!(decoded_a, a);
        let (decoded_b, _) = decode_array(&buf[consumed_a..]).unwrap();
        assert_eq!(decoded_b, b);
    }

    #[test]
    fn truncated_body_is_rejected() {
        let arr = sample_array();
        let mut encoded = encode_array(&arr).unwrap();
        encoded.truncate(encoded.len() - 2);
        assert!(decode_array(&encoded).is_err());
    }
}
