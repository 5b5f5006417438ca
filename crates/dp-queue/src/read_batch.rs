//! `ReadBatch`: resolves a claimed chunk descriptor back into its
//! datapoint payload by reading the owning device's shard directly.

use dp_cache::CacheError;
use dp_codec::{ChunkDescriptor, Datapoint};
use dp_store::{ShardRegistry, ShardState};

/// The payload behind one chunk descriptor, with the absolute index the
/// data starts at so a persister can reconstruct the descriptor's window.
#[derive(Debug, Clone)]
pub struct ReadBatchResult {
    pub device: String,
    pub stream: String,
    pub substream: String,
    pub data: Vec<Datapoint>,
    pub start_index: u64,
}

impl ReadBatchResult {
    pub fn end_index(&self) -> u64 {
        self.start_index + self.data.len() as u64
    }
}

/// Reads the exact `[start, end)` window a descriptor names. The window
/// was only ever published once its chunk had fully closed, so a normal
/// consumer never observes a torn read — but a descriptor can still
/// outlive its data if a trim or delete raced ahead of a slow consumer,
/// in which case this returns an empty result carrying the descriptor's
/// original `start` rather than an error; the persister decides what to
/// do with it (typically dropping it).
pub async fn read_batch(
    registry: &ShardRegistry,
    descriptor: &ChunkDescriptor,
) -> Result<ReadBatchResult, CacheError> {
    let key = descriptor.key.clone();
    let shard = registry.get_or_create(&key.device).await;
    let start = descriptor.start as i64;
    let end = descriptor.end as i64;
    let k = key.clone();
    let range = match shard.run(move |state: &mut ShardState| dp_cache::range(state, &k, start, end)).await? {
        Ok(range) => Some(range),
        Err(CacheError::InvalidRange) => None,
        Err(e) => return Err(e),
    };

    let data = range
        .and_then(|r| r.data)
        .map(dp_codec::DatapointArray::into_vec)
        .unwrap_or_default();

    Ok(ReadBatchResult {
        device: key.device,
        stream: key.stream,
        substream: key.substream,
        data,
        start_index: descriptor.start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_cache::{CacheConfig, InsertPipeline, InsertPipelineConfig};
    use dp_codec::{ChunkDescriptor, Datapoint, SubstreamKey};
    use std::sync::Arc;

    fn dp(ts: f64) -> Datapoint {
        Datapoint::new(ts, ts, "")
    }

    /// S4 — ReadBatch returns the exact claimed window.
    #[tokio::test]
    async fn s4_read_batch_returns_the_claimed_window() {
        let registry = ShardRegistry::new();
        let pipeline = InsertPipeline::new(registry.clone(), CacheConfig { batch_size: 2 }, InsertPipelineConfig::default());
        let key = SubstreamKey::new("", "mystream", "");
        let points: Vec<Datapoint> = (1..=5).map(|i| dp(i as f64)).collect();
        let sink: dp_cache::EmitSink = Arc::new(|_: &ChunkDescriptor| {});
        let outcome = pipeline.insert(&key, points, false, 0, 0, sink).await.unwrap();

        let descriptor = outcome.emitted[0].clone();
        assert_eq!(descriptor.encode(), "{}mystream::0:2");

        let result = read_batch(&registry, &descriptor).await.unwrap();
        assert_eq!(result.start_index, 0);
        assert_eq!(result.end_index(), 2);
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.data[0].timestamp, 1.0);
        assert_eq!(result.data[1].timestamp, 2.0);
    }

    /// A descriptor can outlive its data: `DeleteSubstream` doesn't prune
    /// matching entries out of the batch queue, so a consumer that claims
    /// one afterward must see an empty result carrying the descriptor's
    /// original start, not an error.
    #[tokio::test]
    async fn stale_descriptor_after_delete_reads_back_empty() {
        let registry = ShardRegistry::new();
        let pipeline = InsertPipeline::new(registry.clone(), CacheConfig { batch_size: 2 }, InsertPipelineConfig::default());
        let key = SubstreamKey::new("", "mystream", "");
        let points: Vec<Datapoint> = (1..=10).map(|i| dp(i as f64)).collect();
        let sink: dp_cache::EmitSink = Arc::new(|_: &ChunkDescriptor| {});
        let outcome = pipeline.insert(&key, points, false, 0, 0, sink).await.unwrap();
        let stale = outcome.emitted.last().unwrap().clone();
        assert_eq!(stale.encode(), "{}mystream::8:10");

        let shard = registry.get_or_create(&key.device).await;
        let k = key.clone();
        shard.run(move |state| dp_cache::delete_substream(state, &k)).await.unwrap();

        let sink: dp_cache::EmitSink = Arc::new(|_: &ChunkDescriptor| {});
        pipeline.insert(&key, vec![dp(1.0), dp(2.0), dp(3.0)], false, 0, 0, sink).await.unwrap();

        let result = read_batch(&registry, &stale).await.unwrap();
        assert_eq!(result.start_index, 8);
        assert!(result.data.is_empty());
    }
}
