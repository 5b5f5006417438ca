//! The `ColdStore` trait a persister appends claimed chunks to, plus a
//! couple of reference implementations.

use crate::error::PersistError;
use dp_codec::{ChunkDescriptor, Datapoint, SubstreamKey};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Durable append-only storage for chunks a persister has drained from the
/// batch queue. Implementations only need to support sequential append and
/// a bounded-before read — the cache never asks a cold store for anything
/// more structured than that.
///
/// [`crate::PersisterLoop`] is generic over this trait rather than taking a
/// trait object, so implementations stay plain `async fn` without needing
/// an object-safety shim.
pub trait ColdStore: Send + Sync {
    fn append_chunk(
        &self,
        descriptor: &ChunkDescriptor,
        data: &[Datapoint],
    ) -> impl std::future::Future<Output = Result<(), PersistError>> + Send;

    /// Every point stored for `key` whose absolute index is `< upto_index`,
    /// oldest first.
    fn read_before(
        &self,
        key: &SubstreamKey,
        upto_index: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Datapoint>, PersistError>> + Send;
}

#[derive(Default)]
struct MemoryEntry {
    points: Vec<Datapoint>,
}

/// Keeps appended chunks in a plain map, keyed by substream — good enough
/// for tests and for `dp-sim`'s deterministic scenarios, but not itself
/// durable across a process restart.
#[derive(Default)]
pub struct MemoryColdStore {
    entries: Mutex<HashMap<SubstreamKey, MemoryEntry>>,
}

impl MemoryColdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ColdStore for MemoryColdStore {
    async fn append_chunk(
        &self,
        descriptor: &ChunkDescriptor,
        data: &[Datapoint],
    ) -> Result<(), PersistError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(descriptor.key.clone()).or_default();
        let next_index = entry.points.len() as u64;
        if descriptor.start > next_index {
            return Err(PersistError::Append(format!(
                "gap in cold store append: have {next_index} points, descriptor starts at {}",
                descriptor.start
            )));
        }
        // Idempotent append: re-appending an already-persisted range (the
        // at-least-once retry case) is a no-op rather than a duplicate.
        if descriptor.start < next_index {
            return Ok(());
        }
        entry.points.extend_from_slice(data);
        Ok(())
    }

    async fn read_before(
        &self,
        key: &SubstreamKey,
        upto_index: u64,
    ) -> Result<Vec<Datapoint>, PersistError> {
        let entries = self.entries.lock().await;
        let Some(entry) = entries.get(key) else {
            return Ok(Vec::new());
        };
        let upto = (upto_index as usize).min(entry.points.len());
        Ok(entry.points[..upto].to_vec())
    }
}

/// Appends each chunk as a length-prefixed [`dp_codec`] array to one file
/// per substream under `base_dir`, mirroring how the teacher's write-ahead
/// log frames records on disk. Reads replay the whole file — acceptable
/// for cold storage, which is read far less often than it is appended to.
pub struct FileColdStore {
    base_dir: PathBuf,
    locks: Mutex<HashMap<SubstreamKey, ()>>,
}

impl FileColdStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), locks: Mutex::new(HashMap::new()) }
    }

    fn path_for(&self, key: &SubstreamKey) -> PathBuf {
        let file_name = format!("{}-{}-{}.chunks", key.device, key.stream, key.substream);
        self.base_dir.join(file_name)
    }
}

impl ColdStore for FileColdStore {
    async fn append_chunk(
        &self,
        descriptor: &ChunkDescriptor,
        data: &[Datapoint],
    ) -> Result<(), PersistError> {
        let _guard = self.locks.lock().await;
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| PersistError::Append(e.to_string()))?;

        let path = self.path_for(&descriptor.key);
        let encoded = dp_codec::encode_array(&dp_codec::DatapointArray::from_vec(data.to_vec()))
            .map_err(|e| PersistError::Append(e.to_string()))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| PersistError::Append(e.to_string()))?;
        file.write_all(&encoded).await.map_err(|e| PersistError::Append(e.to_string()))?;
        file.flush().await.map_err(|e| PersistError::Append(e.to_string()))?;
        Ok(())
    }

    async fn read_before(
        &self,
        key: &SubstreamKey,
        upto_index: u64,
    ) -> Result<Vec<Datapoint>, PersistError> {
        let path = self.path_for(key);
        let mut bytes = Vec::new();
        match tokio::fs::File::open(&path).await {
            Ok(mut file) => {
                file.read_to_end(&mut bytes).await.map_err(|e| PersistError::Read(e.to_string()))?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistError::Read(e.to_string())),
        }

        let mut points = Vec::new();
        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            let (array, consumed) =
                dp_codec::decode_array(rest).map_err(|e| PersistError::Read(e.to_string()))?;
            points.extend(array.into_vec());
            rest = &rest[consumed..];
        }
        points.truncate((upto_index as usize).min(points.len()));
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_codec::Datapoint;

    fn dp(ts: f64) -> Datapoint {
        Datapoint::new(ts, ts, "")
    }

    fn desc(start: u64, end: u64) -> ChunkDescriptor {
        ChunkDescriptor { key: SubstreamKey::new("", "mystream", ""), start, end }
    }

    #[tokio::test]
    async fn memory_store_appends_and_reads_back() {
        let store = MemoryColdStore::new();
        let points: Vec<Datapoint> = (1..=2).map(|i| dp(i as f64)).collect();
        store.append_chunk(&desc(0, 2), &points).await.unwrap();

        let read = store.read_before(&SubstreamKey::new("", "mystream", ""), 2).await.unwrap();
        assert_eq!(read.len(), 2);
    }

    #[tokio::test]
    async fn memory_store_append_is_idempotent_under_retry() {
        let store = MemoryColdStore::new();
        let points: Vec<Datapoint> = (1..=2).map(|i| dp(i as f64)).collect();
        store.append_chunk(&desc(0, 2), &points).await.unwrap();
        store.append_chunk(&desc(0, 2), &points).await.unwrap();

        let read = store.read_before(&SubstreamKey::new("", "mystream", ""), 10).await.unwrap();
        assert_eq!(read.len(), 2);
    }

    #[tokio::test]
    async fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileColdStore::new(dir.path());
        let points: Vec<Datapoint> = (1..=3).map(|i| dp(i as f64)).collect();
        store.append_chunk(&desc(0, 3), &points).await.unwrap();

        let read = store.read_before(&SubstreamKey::new("", "mystream", ""), 3).await.unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0].timestamp, 1.0);
    }
}
