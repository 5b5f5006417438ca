use crate::error::FacadeError;
use dp_cache::{CacheConfig, EmitSink, InsertOutcome, InsertPipeline, InsertPipelineConfig, RangeResult};
use dp_codec::{ChunkDescriptor, Datapoint, DatapointArray, SubstreamKey};
use dp_queue::{read_batch, BatchQueue, ReadBatchResult};
use dp_store::{ShardRegistry, ShardState};
use dp_sub::{SubConfig, SubscriptionTable, TransformHandle};
use std::sync::Arc;

/// The streaming datapoint cache. Holds one [`ShardRegistry`] (so every
/// device's mutations funnel through its own worker), the insert pipeline
/// built on top of it, the durable batch queue, and the subscription
/// table — nothing else touches these directly.
pub struct Cache {
    registry: ShardRegistry,
    pipeline: InsertPipeline,
    queue: BatchQueue,
    subs: SubscriptionTable,
}

impl Cache {
    pub fn new(cache_config: CacheConfig, insert_config: InsertPipelineConfig) -> Self {
        let registry = ShardRegistry::new();
        let pipeline = InsertPipeline::new(registry.clone(), cache_config, insert_config);
        Self {
            registry,
            pipeline,
            queue: BatchQueue::new(),
            subs: SubscriptionTable::new(),
        }
    }

    fn stream_path(key: &SubstreamKey) -> String {
        format!("{}:{}", key.device, key.stream)
    }

    /// `Insert(batcher, device, stream, substream, array, restamp,
    /// device_size_limit, stream_size_limit) -> new_length`.
    ///
    /// Runs the insert pipeline (C5 → C2/C3); every closed chunk's
    /// descriptor is pushed onto `batcher`'s list (C4) from inside the
    /// device shard's own atomic script, so emission can never be
    /// reordered relative to the append/counter update it reports on. Only
    /// the subscriber publish (C6) happens afterward, once the mutation
    /// has committed, since that's a side channel rather than part of the
    /// stream's durable state.
    pub async fn insert(
        &self,
        batcher: &str,
        key: &SubstreamKey,
        array: Vec<Datapoint>,
        restamp: bool,
        device_size_limit: u64,
        stream_size_limit: u64,
    ) -> Result<u64, FacadeError> {
        let queue = self.queue.clone();
        let batchers = vec![batcher.to_string()];
        let emit: EmitSink = Arc::new(move |descriptor: &ChunkDescriptor| {
            queue.publish_sync(&batchers, descriptor);
        });

        let InsertOutcome { new_length, stored, .. } =
            self.pipeline.insert(key, array, restamp, device_size_limit, stream_size_limit, emit).await?;

        if !stored.is_empty() {
            let path = Self::stream_path(key);
            self.subs.publish(&path, &key.substream, &DatapointArray::from_vec(stored)).await;
        }

        Ok(new_length)
    }

    async fn run<T, F>(&self, device: &str, script: F) -> Result<T, FacadeError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ShardState) -> T + Send + 'static,
    {
        let shard = self.registry.get_or_create(device).await;
        shard.run(script).await.map_err(dp_cache::CacheError::from).map_err(FacadeError::from)
    }

    pub async fn get(&self, key: &SubstreamKey) -> Result<DatapointArray, FacadeError> {
        let k = key.clone();
        self.run(&key.device, move |state| dp_cache::get(state, &k)).await?.map_err(FacadeError::from)
    }

    pub async fn range(&self, key: &SubstreamKey, i1: i64, i2: i64) -> Result<RangeResult, FacadeError> {
        let k = key.clone();
        self.run(&key.device, move |state| dp_cache::range(state, &k, i1, i2)).await?.map_err(FacadeError::from)
    }

    pub async fn stream_length(&self, key: &SubstreamKey) -> Result<u64, FacadeError> {
        let k = key.clone();
        self.run(&key.device, move |state| dp_cache::stream_length(state, &k)).await
    }

    pub async fn trim_stream(&self, key: &SubstreamKey, upto_index: u64) -> Result<(), FacadeError> {
        let k = key.clone();
        self.run(&key.device, move |state| dp_cache::trim(state, &k, upto_index)).await?.map_err(FacadeError::from)
    }

    pub async fn delete_substream(&self, key: &SubstreamKey) -> Result<(), FacadeError> {
        let k = key.clone();
        self.run(&key.device, move |state| dp_cache::delete_substream(state, &k)).await
    }

    pub async fn delete_stream(&self, device: &str, stream: &str) -> Result<(), FacadeError> {
        let device_owned = device.to_string();
        let stream_owned = stream.to_string();
        self.run(device, move |state| dp_cache::delete_stream(state, &device_owned, &stream_owned)).await
    }

    /// Discards a whole device's keyspace. Since every device is already
    /// isolated to its own shard, this reduces to discarding and
    /// recreating that shard's state rather than enumerating streams.
    pub async fn delete_hash(&self, device: &str) -> Result<(), FacadeError> {
        self.registry.reset(device).await;
        Ok(())
    }

    pub async fn hash_size(&self, device: &str) -> Result<u64, FacadeError> {
        let device_owned = device.to_string();
        self.run(device, move |state| dp_cache::device_byte_size(state, &device_owned)).await
    }

    pub async fn stream_size(&self, key: &SubstreamKey) -> Result<u64, FacadeError> {
        let k = key.clone();
        self.run(&key.device, move |state| dp_cache::byte_size(state, &k)).await
    }

    pub async fn next_batch(&self, src: &str, dest: &str) -> Result<Option<ChunkDescriptor>, FacadeError> {
        Ok(self.queue.next_batch(src, dest).await?)
    }

    pub async fn read_batch(&self, descriptor: &ChunkDescriptor) -> Result<ReadBatchResult, FacadeError> {
        Ok(read_batch(&self.registry, descriptor).await?)
    }

    pub async fn get_list(&self, name: &str) -> Result<Vec<ChunkDescriptor>, FacadeError> {
        Ok(self.queue.get_list(name).await?)
    }

    /// Exposes the façade's own batch queue so a persister can be wired
    /// directly against it (e.g. `PersisterLoop::new(cache.batch_queue(),
    /// cache.shard_registry(), store, ...)`) instead of duplicating
    /// `NextBatch`/`ReadBatch` calls through the façade one at a time.
    pub fn batch_queue(&self) -> BatchQueue {
        self.queue.clone()
    }

    pub fn shard_registry(&self) -> ShardRegistry {
        self.registry.clone()
    }

    pub async fn subscribe(
        &self,
        device: &str,
        stream: &str,
        config: SubConfig,
    ) -> tokio_stream::wrappers::ReceiverStream<dp_sub::Envelope> {
        self.subs.register(format!("{device}:{stream}"), config).await
    }

    pub async fn add_transform(
        &self,
        device: &str,
        stream: &str,
        expr: impl Into<String>,
        handle: Option<TransformHandle>,
    ) -> Result<(), dp_sub::SubError> {
        self.subs.add_transform(&format!("{device}:{stream}"), expr, handle).await
    }
}
