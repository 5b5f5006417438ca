//! Insert pipeline (C5): validates timestamps, restamps on request,
//! enforces size limits, and splits oversized arrays before handing
//! chunk-aligned groups to the stream log (C3).

use crate::config::{CacheConfig, InsertPipelineConfig, RestampMode};
use crate::error::{CacheError, LimitScope};
use crate::streamlog;
use dp_codec::{ChunkDescriptor, Datapoint, DatapointArray, SubstreamKey};
use dp_store::{ShardRegistry, ShardState};
use std::sync::Arc;

/// A callback invoked synchronously, from inside the owning device's shard
/// script, once per chunk descriptor closed by an insert. Letting the
/// batch queue publish happen here — rather than after the script returns —
/// keeps descriptor emission part of the same atomic bundle as the append
/// and counter update, so batcher-list order can never diverge from a
/// substream's true insert order under concurrent callers.
pub type EmitSink = Arc<dyn Fn(&ChunkDescriptor) + Send + Sync>;

/// Outcome of a single `Insert` call: the substream's new length, every
/// chunk descriptor that closed as a result (in the order their chunks
/// closed), and the points actually stored — identical to the input
/// unless `restamp` rewrote some timestamps, which is what a subscriber
/// publish should see rather than the caller's raw request.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub new_length: u64,
    pub emitted: Vec<ChunkDescriptor>,
    pub stored: Vec<Datapoint>,
}

pub struct InsertPipeline {
    registry: ShardRegistry,
    config: InsertPipelineConfig,
    cache_config: CacheConfig,
}

impl InsertPipeline {
    pub fn new(registry: ShardRegistry, cache_config: CacheConfig, config: InsertPipelineConfig) -> Self {
        Self { registry, config, cache_config }
    }

    /// Validates, restamps if requested, and inserts `array`, splitting
    /// into successive calls when longer than `max_script_items`. Each
    /// sub-call independently re-checks size limits against pre-insert
    /// state, per the contract.
    pub async fn insert(
        &self,
        key: &SubstreamKey,
        mut array: Vec<Datapoint>,
        restamp: bool,
        device_size_limit: u64,
        stream_size_limit: u64,
        on_emit: EmitSink,
    ) -> Result<InsertOutcome, CacheError> {
        if array.is_empty() {
            let shard = self.registry.get_or_create(&key.device).await;
            let k = key.clone();
            let length = shard.run(move |state: &mut ShardState| streamlog::stream_length(state, &k)).await?;
            return Ok(InsertOutcome { new_length: length, emitted: Vec::new(), stored: Vec::new() });
        }

        validate_internal_monotonicity(&array)?;

        let shard = self.registry.get_or_create(&key.device).await;
        let mut new_length = 0u64;
        let mut all_emitted = Vec::new();
        let mut all_stored = Vec::new();

        for group in array.drain(..).collect::<Vec<_>>().chunks(self.config.max_script_items) {
            let mut group = group.to_vec();
            let k = key.clone();
            let config = self.config;
            let batch_size = self.cache_config.batch_size;
            let emit = on_emit.clone();
            type GroupOutcome = (u64, Vec<ChunkDescriptor>, Vec<Datapoint>);
            let outcome: Result<GroupOutcome, CacheError> = shard
                .run(move |state: &mut ShardState| -> Result<GroupOutcome, CacheError> {
                    let incoming_bytes = DatapointArray::from_vec(group.clone()).estimated_byte_size();

                    let device_bytes = streamlog::device_byte_size(state, &k.device);
                    if device_size_limit > 0 && device_bytes + incoming_bytes >= device_size_limit {
                        return Err(CacheError::SizeLimit { scope: LimitScope::Device });
                    }
                    let stream_bytes = streamlog::byte_size(state, &k);
                    if stream_size_limit > 0 && stream_bytes + incoming_bytes >= stream_size_limit {
                        return Err(CacheError::SizeLimit { scope: LimitScope::Stream });
                    }

                    let last_ts = streamlog::last_timestamp(state, &k);
                    if restamp {
                        apply_restamp(&mut group, last_ts, config);
                    } else if group[0].timestamp < last_ts {
                        return Err(CacheError::Timestamp);
                    }

                    let (length, emitted) = streamlog::insert(state, &k, &group, batch_size)?;
                    for descriptor in &emitted {
                        emit(descriptor);
                    }
                    Ok((length, emitted, group))
                })
                .await?;

            let (length, emitted, stored) = outcome?;
            new_length = length;
            all_emitted.extend(emitted);
            all_stored.extend(stored);
        }

        Ok(InsertOutcome { new_length, emitted: all_emitted, stored: all_stored })
    }
}

fn validate_internal_monotonicity(array: &[Datapoint]) -> Result<(), CacheError> {
    for pair in array.windows(2) {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(CacheError::Timestamp);
        }
    }
    Ok(())
}

/// Rewrites timestamps forward so the array is monotonically
/// non-decreasing relative to `last_timestamp`. For each point whose
/// timestamp is strictly less than the running max, it is set to the
/// running max — with the legacy ε=1e-5 bump when the running max is
/// integer-valued, reproducing the original implementation's test
/// vectors (see `RestampMode`).
fn apply_restamp(array: &mut [Datapoint], last_timestamp: f64, config: InsertPipelineConfig) {
    let mut running_max = last_timestamp;
    for dp in array.iter_mut() {
        if dp.timestamp < running_max {
            let bump = match config.restamp_mode {
                RestampMode::Strict => config.restamp_epsilon,
                RestampMode::Legacy => {
                    if running_max.fract() == 0.0 {
                        config.restamp_epsilon
                    } else {
                        0.0
                    }
                }
            };
            dp.timestamp = running_max + bump;
        }
        running_max = running_max.max(dp.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_codec::Datapoint;
    use dp_store::ShardRegistry;
    use crate::config::CacheConfig;

    fn dp(ts: f64) -> Datapoint {
        Datapoint::new(ts, ts, "")
    }

    fn key() -> SubstreamKey {
        SubstreamKey::new("", "mystream", "")
    }

    fn noop_sink() -> EmitSink {
        Arc::new(|_: &ChunkDescriptor| {})
    }

    /// S2 — timestamp rejection.
    #[tokio::test]
    async fn s2_timestamp_rejection() {
        let pipeline = InsertPipeline::new(ShardRegistry::new(), CacheConfig::default(), InsertPipelineConfig::default());
        let k = key();
        let dpa6: Vec<Datapoint> = (1..=5).map(|i| dp(i as f64)).collect();
        pipeline.insert(&k, dpa6, false, 0, 0, noop_sink()).await.unwrap();

        let dpa1 = vec![dp(1.0), dp(2.0)];
        let err = pipeline.insert(&k, dpa1, false, 0, 0, noop_sink()).await.unwrap_err();
        assert!(matches!(err, CacheError::Timestamp));
    }

    /// S3 — restamp.
    #[tokio::test]
    async fn s3_restamp() {
        let pipeline = InsertPipeline::new(ShardRegistry::new(), CacheConfig::default(), InsertPipelineConfig::default());
        let k = key();
        let dpa6: Vec<Datapoint> = (1..=5).map(|i| dp(i as f64)).collect();
        pipeline.insert(&k, dpa6, false, 0, 0, noop_sink()).await.unwrap();

        let dpa1 = vec![dp(1.0), dp(2.0)];
        let outcome = pipeline.insert(&k, dpa1, true, 0, 0, noop_sink()).await.unwrap();
        assert_eq!(outcome.new_length, 7);
    }

    #[tokio::test]
    async fn empty_array_is_a_no_op() {
        let pipeline = InsertPipeline::new(ShardRegistry::new(), CacheConfig::default(), InsertPipelineConfig::default());
        let k = key();
        let outcome = pipeline.insert(&k, vec![dp(1.0)], false, 0, 0, noop_sink()).await.unwrap();
        assert_eq!(outcome.new_length, 1);

        let outcome = pipeline.insert(&k, vec![], false, 0, 0, noop_sink()).await.unwrap();
        assert_eq!(outcome.new_length, 1);
    }

    #[tokio::test]
    async fn device_size_limit_rejects_before_mutation() {
        let pipeline = InsertPipeline::new(ShardRegistry::new(), CacheConfig::default(), InsertPipelineConfig::default());
        let k = key();
        pipeline.insert(&k, vec![dp(1.0)], false, 0, 0, noop_sink()).await.unwrap();

        let err = pipeline.insert(&k, vec![dp(2.0)], false, 1, 0, noop_sink()).await.unwrap_err();
        assert!(matches!(err, CacheError::SizeLimit { scope: LimitScope::Device }));
    }

    #[tokio::test]
    async fn stream_size_limit_projects_the_incoming_array() {
        let pipeline = InsertPipeline::new(ShardRegistry::new(), CacheConfig::default(), InsertPipelineConfig::default());
        let k = key();
        pipeline.insert(&k, vec![dp(1.0)], false, 0, 0, noop_sink()).await.unwrap();
        let size = DatapointArray::from_vec(vec![dp(1.0)]).estimated_byte_size();

        // A limit only 3 bytes above current usage must still reject an
        // incoming array that itself encodes to far more than 3 bytes.
        let err = pipeline
            .insert(&k, vec![dp(2.0), dp(3.0)], false, 0, size + 3, noop_sink())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::SizeLimit { scope: LimitScope::Stream }));
    }
}
