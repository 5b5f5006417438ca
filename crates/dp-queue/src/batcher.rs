//! Batch queue (C4): named lists of pending chunk descriptors.
//!
//! Every configured batcher tag owns a list; `NextBatch` atomically moves
//! the oldest pending descriptor into a destination list (typically an
//! "inflight" list), giving the at-least-once consumer protocol a place
//! to recover an in-progress claim after a crash.

use crate::record::{self, RecordError};
use dp_codec::ChunkDescriptor;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("descriptor record error: {0}")]
    Record(#[from] RecordError),
}

#[derive(Default)]
struct Lists {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
}

/// The full set of batcher lists, shared across every device (batcher
/// lists are not device-sharded — they live under the literal `{}` tag
/// regardless of which device produced a descriptor).
#[derive(Default, Clone)]
pub struct BatchQueue {
    inner: std::sync::Arc<Mutex<Lists>>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `descriptor` to every named batcher list — called once
    /// per chunk boundary crossed by an insert, for every batcher
    /// currently configured to receive that substream's descriptors.
    pub async fn publish(&self, batchers: &[String], descriptor: &ChunkDescriptor) {
        self.publish_sync(batchers, descriptor);
    }

    /// Synchronous counterpart to [`Self::publish`] — does the same
    /// prepend, but through a blocking lock so it can be called from
    /// inside a device shard's synchronous script. That's what lets
    /// descriptor emission commit atomically with the append and counter
    /// update it's reporting on, instead of racing a separate publish
    /// against other inserts once the script has already returned.
    pub fn publish_sync(&self, batchers: &[String], descriptor: &ChunkDescriptor) {
        let encoded = record::encode(descriptor);
        let mut lists = self.inner.lock().unwrap();
        for batcher in batchers {
            lists.lists.entry(batcher.clone()).or_default().push_front(encoded.clone());
        }
    }

    /// Atomically moves the oldest (tail) descriptor from `src` to `dest`
    /// and returns it. Returns `None` if `src` is empty — not an error.
    pub async fn next_batch(&self, src: &str, dest: &str) -> Result<Option<ChunkDescriptor>, QueueError> {
        let mut lists = self.inner.lock().unwrap();
        let Some(bytes) = lists.lists.get_mut(src).and_then(VecDeque::pop_back) else {
            return Ok(None);
        };
        if let Some(list) = lists.lists.get(src) {
            if list.is_empty() {
                lists.lists.remove(src);
            }
        }
        let descriptor = record::decode(&bytes)?;
        lists.lists.entry(dest.to_string()).or_default().push_front(bytes);
        Ok(Some(descriptor))
    }

    /// Snapshot of `name`, newest-first, matching the original's
    /// `GetList` ordering.
    pub async fn get_list(&self, name: &str) -> Result<Vec<ChunkDescriptor>, QueueError> {
        let lists = self.inner.lock().unwrap();
        let Some(entries) = lists.lists.get(name) else {
            return Ok(Vec::new());
        };
        entries.iter().map(|bytes| record::decode(bytes).map_err(QueueError::from)).collect()
    }

    pub async fn delete_key(&self, name: &str) {
        self.inner.lock().unwrap().lists.remove(name);
    }

    /// Removes the single entry matching `descriptor` from `name` — how a
    /// persister acknowledges one claimed entry in an `inflight` list
    /// without clearing entries other consumers are still working.
    pub async fn ack(&self, name: &str, descriptor: &ChunkDescriptor) -> Result<(), QueueError> {
        let encoded = descriptor.encode();
        let mut lists = self.inner.lock().unwrap();
        let Some(entries) = lists.lists.remove(name) else {
            return Ok(());
        };
        let mut retained = VecDeque::with_capacity(entries.len());
        for bytes in entries {
            let decoded = record::decode(&bytes)?;
            if decoded.encode() != encoded {
                retained.push_back(bytes);
            }
        }
        if !retained.is_empty() {
            lists.lists.insert(name.to_string(), retained);
        }
        Ok(())
    }
}
