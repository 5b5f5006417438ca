use crate::error::StoreError;
use crate::hash::HashStore;
use crate::list::ListStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// The state a single device's shard owns exclusively.
#[derive(Debug, Default)]
pub struct ShardState {
    pub hashes: HashStore,
    pub lists: ListStore,
}

type Job = Box<dyn FnOnce(&mut ShardState) + Send + 'static>;

/// A single-device worker: every mutation touching that device's keys runs
/// as a closure submitted to this shard's queue and executed in order by
/// its dedicated task, so multi-key updates against one device are
/// effectively atomic without a global lock.
pub struct Shard {
    tx: mpsc::Sender<Job>,
}

impl Shard {
    fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(1024);
        tokio::spawn(async move {
            let mut state = ShardState::default();
            while let Some(job) = rx.recv().await {
                job(&mut state);
            }
        });
        Self { tx }
    }

    /// Runs `script` against this shard's state and returns its result.
    /// Scripts never `.await` — they're synchronous closures over
    /// `ShardState`, which is what keeps them atomic with respect to other
    /// scripts queued on the same shard.
    pub async fn run<T, F>(&self, script: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ShardState) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |state| {
            let result = script(state);
            let _ = reply_tx.send(result);
        });
        self.tx.send(job).await.map_err(|_| StoreError::ShardClosed)?;
        reply_rx.await.map_err(|_| StoreError::ShardClosed)
    }
}

/// Maps device id to its shard, creating shards lazily on first touch
/// (keys are created implicitly, never provisioned ahead of time).
#[derive(Clone, Default)]
pub struct ShardRegistry {
    shards: Arc<RwLock<HashMap<String, Arc<Shard>>>>,
}

impl ShardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, device: &str) -> Arc<Shard> {
        if let Some(shard) = self.shards.read().await.get(device) {
            return Arc::clone(shard);
        }
        let mut shards = self.shards.write().await;
        Arc::clone(
            shards
                .entry(device.to_string())
                .or_insert_with(|| Arc::new(Shard::spawn())),
        )
    }

    pub async fn device_count(&self) -> usize {
        self.shards.read().await.len()
    }

    /// Discards a device's shard entirely — the next `get_or_create` spawns
    /// a fresh one with empty state. Any script already queued against the
    /// old shard still runs to completion against its own `ShardState`;
    /// they just never observe each other.
    pub async fn reset(&self, device: &str) {
        self.shards.write().await.remove(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripts_against_same_shard_serialize() {
        let registry = ShardRegistry::new();
        let shard = registry.get_or_create("dev1").await;

        let mut handles = Vec::new();
        for _ in 0..100 {
            let shard = Arc::clone(&shard);
            handles.push(tokio::spawn(async move {
                shard
                    .run(|state| state.hashes.incr_by("meta", "count", 1))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let total = shard
            .run(|state| state.hashes.get_int("meta", "count"))
            .await
            .unwrap();
        assert_eq!(total, 100);
    }

    #[tokio::test]
    async fn shards_are_per_device() {
        let registry = ShardRegistry::new();
        registry.get_or_create("a").await;
        registry.get_or_create("b").await;
        registry.get_or_create("a").await;
        assert_eq!(registry.device_count().await, 2);
    }
}
