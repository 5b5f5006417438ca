//! Consumer loop draining the batch queue into a [`ColdStore`].
//!
//! Implements the at-least-once protocol described for C4: claim an entry
//! into an `inflight` list, persist it, acknowledge it, then trim the
//! cache up to what's now durable. A crash between claim and acknowledge
//! leaves the entry in `inflight` for a retry, which the cold store's
//! append must tolerate idempotently.

use crate::coldstore::ColdStore;
use crate::error::PersistError;
use dp_queue::{read_batch, BatchQueue};
use dp_store::ShardRegistry;

pub struct PersisterLoop<C: ColdStore> {
    queue: BatchQueue,
    registry: ShardRegistry,
    store: C,
    pending_list: String,
    inflight_list: String,
}

impl<C: ColdStore> PersisterLoop<C> {
    pub fn new(
        queue: BatchQueue,
        registry: ShardRegistry,
        store: C,
        pending_list: impl Into<String>,
        inflight_list: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            registry,
            store,
            pending_list: pending_list.into(),
            inflight_list: inflight_list.into(),
        }
    }

    /// Drains and persists a single pending descriptor. Returns `false`
    /// when the pending list was empty — not an error, just nothing to do.
    pub async fn run_once(&self) -> Result<bool, PersistError> {
        let Some(descriptor) = self.queue.next_batch(&self.pending_list, &self.inflight_list).await? else {
            return Ok(false);
        };

        let batch = read_batch(&self.registry, &descriptor).await?;
        self.store.append_chunk(&descriptor, &batch.data).await?;
        self.queue.ack(&self.inflight_list, &descriptor).await?;

        let shard = self.registry.get_or_create(&descriptor.key.device).await;
        let key = descriptor.key.clone();
        let upto = batch.end_index();
        shard.run(move |state| dp_cache::trim(state, &key, upto)).await??;

        Ok(true)
    }

    /// Drains the pending list to empty, persisting each entry in turn.
    pub async fn drain(&self) -> Result<usize, PersistError> {
        let mut count = 0;
        while self.run_once().await? {
            count += 1;
        }
        Ok(count)
    }
}
