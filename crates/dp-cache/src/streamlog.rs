//! Per-substream ordered log: chunked storage, range reads, and trim.
//!
//! All functions here are synchronous and operate directly on a
//! [`dp_store::ShardState`] — they are meant to be run as a script via
//! `Shard::run`, so a whole insert or range read executes atomically with
//! respect to other scripts queued on the same device's shard.

use crate::error::CacheError;
use dp_codec::{decode_array, encode_array, ChunkDescriptor, DatapointArray, Datapoint, SubstreamKey};
use dp_store::ShardState;

const FIELD_LENGTH: &str = "length";
const FIELD_FIRST_CACHED_INDEX: &str = "first_cached_index";
const FIELD_LAST_TIMESTAMP: &str = "last_timestamp";
const FIELD_BYTE_SIZE: &str = "byte_size";

fn stream_index_hash(stream: &str) -> String {
    format!("__substreams__{stream}")
}

pub fn stream_length(state: &ShardState, key: &SubstreamKey) -> u64 {
    state.hashes.get_int(&key.meta_key(), FIELD_LENGTH).max(0) as u64
}

pub fn first_cached_index(state: &ShardState, key: &SubstreamKey) -> u64 {
    state.hashes.get_int(&key.meta_key(), FIELD_FIRST_CACHED_INDEX).max(0) as u64
}

pub fn last_timestamp(state: &ShardState, key: &SubstreamKey) -> f64 {
    f64::from_bits(state.hashes.get_int(&key.meta_key(), FIELD_LAST_TIMESTAMP) as u64)
}

pub fn byte_size(state: &ShardState, key: &SubstreamKey) -> u64 {
    state.hashes.get_int(&key.meta_key(), FIELD_BYTE_SIZE).max(0) as u64
}

pub fn device_byte_size(state: &ShardState, device: &str) -> u64 {
    let device_hash = format!("{{{device}}}");
    state
        .hashes
        .fields(&device_hash)
        .iter()
        .map(|field| state.hashes.get_int(&device_hash, field).max(0) as u64)
        .sum()
}

fn decode_chunk(bytes: &[u8]) -> Result<Vec<Datapoint>, CacheError> {
    let (arr, _) = decode_array(bytes)?;
    Ok(arr.into_vec())
}

fn encode_chunk(points: &[Datapoint]) -> Result<Vec<u8>, CacheError> {
    Ok(encode_array(&DatapointArray::from_vec(points.to_vec()))?)
}

/// Decodes the full cached array in chronological (oldest-first) order.
pub fn get(state: &ShardState, key: &SubstreamKey) -> Result<DatapointArray, CacheError> {
    let meta = key.meta_key();
    let chunks_newest_first = state.lists.range(&meta, 0, -1);
    let mut out = Vec::new();
    for chunk_bytes in chunks_newest_first.iter().rev() {
        out.extend(decode_chunk(chunk_bytes)?);
    }
    Ok(DatapointArray::from_vec(out))
}

/// Registers a previously-unseen substream under its stream's index hash,
/// so `delete_stream` can later enumerate every substream it created.
fn register_substream(state: &mut ShardState, key: &SubstreamKey) {
    let meta = key.meta_key();
    if !state.hashes.exists(&meta) {
        state
            .hashes
            .set(&stream_index_hash(&key.stream), &key.substream, 1i64);
    }
}

/// Appends `array` to the log, splitting into chunk-boundary-aligned
/// groups and emitting a descriptor for each chunk that becomes exactly
/// full. Returns the new `length` and the descriptors emitted, in the
/// order their chunks closed.
pub fn insert(
    state: &mut ShardState,
    key: &SubstreamKey,
    array: &[Datapoint],
    batch_size: usize,
) -> Result<(u64, Vec<ChunkDescriptor>), CacheError> {
    if array.is_empty() {
        return Ok((stream_length(state, key), Vec::new()));
    }

    register_substream(state, key);
    let meta = key.meta_key();
    let mut length = stream_length(state, key);
    let mut emitted = Vec::new();
    let mut idx = 0;

    while idx < array.len() {
        let existing = state.lists.pop_front(&meta);
        let mut chunk_points = match existing {
            Some(bytes) => {
                let pts = decode_chunk(&bytes)?;
                if pts.len() >= batch_size {
                    state.lists.push_front(&meta, bytes);
                    Vec::new()
                } else {
                    pts
                }
            }
            None => Vec::new(),
        };

        let prior_len = chunk_points.len();
        let room = batch_size - prior_len;
        let take = room.min(array.len() - idx);
        chunk_points.extend_from_slice(&array[idx..idx + take]);
        idx += take;
        length += take as u64;

        let chunk_end = length;
        let chunk_start = chunk_end - chunk_points.len() as u64;
        let full = chunk_points.len() == batch_size;
        let encoded = encode_chunk(&chunk_points)?;
        state.lists.push_front(&meta, encoded);

        if full {
            emitted.push(ChunkDescriptor {
                key: key.clone(),
                start: chunk_start,
                end: chunk_end,
            });
        }
    }

    let inserted_bytes = DatapointArray::from_vec(array.to_vec()).estimated_byte_size();
    state.hashes.set(&meta, FIELD_LENGTH, length as i64);
    state
        .hashes
        .set(&meta, FIELD_LAST_TIMESTAMP, array.last().unwrap().timestamp.to_bits() as i64);
    state.hashes.incr_by(&meta, FIELD_BYTE_SIZE, inserted_bytes as i64);

    let device_hash = key.device_key();
    let field = format!("{}:{}", key.stream, key.substream);
    state.hashes.incr_by(&device_hash, &field, inserted_bytes as i64);

    Ok((length, emitted))
}

/// Outcome of a `Range` call: `data` is `None` when the requested window
/// starts before `first_cached_index` (not an error — caller consults
/// cold storage), with `effective_i1`/`effective_i2` the normalized
/// absolute window regardless.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeResult {
    pub data: Option<DatapointArray>,
    pub effective_i1: i64,
    pub effective_i2: i64,
}

pub fn range(state: &ShardState, key: &SubstreamKey, i1: i64, i2: i64) -> Result<RangeResult, CacheError> {
    let length = stream_length(state, key) as i64;
    if length == 0 {
        return Ok(RangeResult {
            data: Some(DatapointArray::new()),
            effective_i1: 0,
            effective_i2: 0,
        });
    }

    let i1p = if i1 < 0 { (length + i1).max(0) } else { i1 };
    let i2p = if i2 == 0 {
        length
    } else if i2 < 0 {
        length + i2
    } else {
        i2
    };

    if i1p > length || i1p > i2p {
        return Err(CacheError::InvalidRange);
    }

    let fci = first_cached_index(state, key) as i64;
    let eff_i2 = i2p.min(length);

    if i1p < fci {
        return Ok(RangeResult {
            data: None,
            effective_i1: i1p,
            effective_i2: eff_i2,
        });
    }

    let full = get(state, key)?;
    let rel_start = (i1p - fci) as usize;
    let rel_end = ((eff_i2 - fci).max(0) as usize).min(full.len());
    let slice = full.as_slice()[rel_start.min(rel_end)..rel_end].to_vec();

    Ok(RangeResult {
        data: Some(DatapointArray::from_vec(slice)),
        effective_i1: i1p,
        effective_i2: eff_i2,
    })
}

/// Discards whole chunks whose end index is `<= upto_index`, starting
/// from the tail (oldest). A no-op if `upto_index <= first_cached_index`.
/// Never trims partway through a chunk, so the effective trim point may
/// lag the request by up to `batch_size - 1`.
pub fn trim(state: &mut ShardState, key: &SubstreamKey, upto_index: u64) -> Result<(), CacheError> {
    let meta = key.meta_key();
    let mut fci = first_cached_index(state, key);
    if upto_index <= fci {
        return Ok(());
    }

    let mut discarded_bytes: u64 = 0;
    loop {
        let Some(bytes) = state.lists.pop_back(&meta) else {
            break;
        };
        let chunk = decode_chunk(&bytes)?;
        let candidate_end = fci + chunk.len() as u64;
        if candidate_end <= upto_index {
            discarded_bytes += DatapointArray::from_vec(chunk).estimated_byte_size();
            fci = candidate_end;
        } else {
            state.lists.push_back(&meta, bytes);
            break;
        }
    }

    state.hashes.set(&meta, FIELD_FIRST_CACHED_INDEX, fci as i64);
    if discarded_bytes > 0 {
        state.hashes.incr_by(&meta, FIELD_BYTE_SIZE, -(discarded_bytes as i64));
        let device_hash = key.device_key();
        let field = format!("{}:{}", key.stream, key.substream);
        state.hashes.incr_by(&device_hash, &field, -(discarded_bytes as i64));
    }
    Ok(())
}

fn delete_substream_inner(state: &mut ShardState, key: &SubstreamKey) {
    let meta = key.meta_key();
    let size = byte_size(state, key);
    state.hashes.delete(&meta);
    state.lists.delete(&meta);
    if size > 0 {
        let device_hash = key.device_key();
        let field = format!("{}:{}", key.stream, key.substream);
        state.hashes.incr_by(&device_hash, &field, -(size as i64));
    }
    state.hashes.remove_field(&stream_index_hash(&key.stream), &key.substream);
}

/// Removes one substream's log entirely. Existing batch-queue descriptors
/// referencing its chunks are left in place.
pub fn delete_substream(state: &mut ShardState, key: &SubstreamKey) {
    delete_substream_inner(state, key);
}

/// Removes every substream of `stream` within `device`.
pub fn delete_stream(state: &mut ShardState, device: &str, stream: &str) {
    let index_hash = stream_index_hash(stream);
    let substreams = state.hashes.fields(&index_hash);
    for substream in substreams {
        let key = SubstreamKey::new(device, stream, substream);
        delete_substream_inner(state, &key);
    }
    state.hashes.delete(&index_hash);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_store::ShardState;

    fn dp(ts: f64) -> Datapoint {
        Datapoint::new(ts, ts, "")
    }

    fn key() -> SubstreamKey {
        SubstreamKey::new("", "mystream", "")
    }

    /// S1 — chunk emission at BatchSize=2 with 5 points.
    #[test]
    fn s1_chunk_emission_at_boundary() {
        let mut state = ShardState::default();
        let k = key();
        let points: Vec<Datapoint> = (1..=5).map(|i| dp(i as f64)).collect();

        let (length, emitted) = insert(&mut state, &k, &points, 2).unwrap();
        assert_eq!(length, 5);

        let descriptors: Vec<String> = emitted.iter().map(ChunkDescriptor::encode).collect();
        assert_eq!(descriptors, vec!["{}mystream::0:2", "{}mystream::2:4"]);

        assert_eq!(stream_length(&state, &k), 5);

        let r = range(&state, &k, -20, 0).unwrap();
        assert_eq!(r.effective_i1, 0);
        assert_eq!(r.effective_i2, 5);
        assert_eq!(r.data.unwrap().len(), 5);
    }

    /// S5 — trim behavior (timestamp monotonicity is enforced by the
    /// insert pipeline, not this module — the log trusts its caller's
    /// precondition check).
    #[test]
    fn s5_trim_behavior() {
        let mut state = ShardState::default();
        let k = key();
        let points: Vec<Datapoint> = (1..=9).map(|i| dp(i as f64)).collect();
        insert(&mut state, &k, &points, 3).unwrap();

        trim(&mut state, &k, 2).unwrap();
        assert_eq!(first_cached_index(&state, &k), 0);
        assert_eq!(get(&state, &k).unwrap().len(), 9);

        trim(&mut state, &k, 1).unwrap();
        assert_eq!(first_cached_index(&state, &k), 0);

        trim(&mut state, &k, 3).unwrap();
        assert_eq!(first_cached_index(&state, &k), 3);
        assert_eq!(get(&state, &k).unwrap().len(), 6);
        assert_eq!(stream_length(&state, &k), 9);
    }

    /// S6 — range miss after trim.
    #[test]
    fn s6_range_miss_after_trim() {
        let mut state = ShardState::default();
        let k = key();
        let points: Vec<Datapoint> = (1..=9).map(|i| dp(i as f64)).collect();
        insert(&mut state, &k, &points, 3).unwrap();
        trim(&mut state, &k, 3).unwrap();

        let miss = range(&state, &k, 2, 0).unwrap();
        assert!(miss.data.is_none());
        assert_eq!(miss.effective_i1, 2);
        assert_eq!(miss.effective_i2, 9);

        let hit = range(&state, &k, 3, 0).unwrap();
        assert_eq!(hit.effective_i1, 3);
        assert_eq!(hit.effective_i2, 9);
        assert_eq!(hit.data.unwrap().len(), 6);
    }

    /// S7 — cross-scope deletes.
    #[test]
    fn s7_delete_stream_scopes_correctly() {
        let mut state = ShardState::default();
        let s1 = SubstreamKey::new("h1", "mystream", "s1");
        let primary = SubstreamKey::new("h1", "my2stream", "");

        insert(&mut state, &s1, &[dp(1.0)], 2).unwrap();
        insert(&mut state, &primary, &[dp(1.0)], 2).unwrap();

        delete_stream(&mut state, "h1", "my2stream");

        assert_eq!(stream_length(&state, &primary), 0);
        assert_eq!(stream_length(&state, &s1), 1);
    }
}
