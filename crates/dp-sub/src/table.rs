//! The subscription table (C6): one subscription per stream path, with
//! many concurrent publishers sharing a read lock and add/remove/close
//! taking the write lock.

use crate::config::SubConfig;
use crate::error::SubError;
use crate::sender::SubscriberSender;
use crate::subscription::Subscription;
use dp_codec::DatapointArray;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_stream::wrappers::ReceiverStream;

/// Registry of active subscriptions, keyed by full stream path (device +
/// stream; routing does not look at substream — subscribers receive it on
/// each envelope and filter themselves).
#[derive(Default)]
pub struct SubscriptionTable {
    subs: RwLock<HashMap<String, Arc<Subscription>>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscription on `stream_path`, replacing any
    /// existing one under the same path (a reconnect). Returns the
    /// subscription handle and the stream of envelopes it will receive.
    pub async fn register(&self, stream_path: impl Into<String>, config: SubConfig) -> ReceiverStream<crate::transform::Envelope> {
        let (sender, rx) = SubscriberSender::new(config.message_buffer);
        let subscription = Arc::new(Subscription::new(sender));
        self.subs.write().await.insert(stream_path.into(), subscription);
        rx
    }

    pub async fn add_transform(
        &self,
        stream_path: &str,
        expr: impl Into<String>,
        handle: Option<crate::transform::TransformHandle>,
    ) -> Result<(), SubError> {
        let subs = self.subs.read().await;
        let Some(sub) = subs.get(stream_path) else {
            return Err(SubError::Closed);
        };
        sub.add(expr, handle)
    }

    /// Removes `expr` from the subscription on `stream_path`; if the
    /// transform set is now empty, tears the whole subscription down and
    /// removes it from the table.
    pub async fn remove_transform(&self, stream_path: &str, expr: &str) -> Result<(), SubError> {
        let now_empty = {
            let subs = self.subs.read().await;
            let Some(sub) = subs.get(stream_path) else {
                return Err(SubError::Closed);
            };
            sub.remove(expr)?
        };
        if now_empty {
            self.close(stream_path).await;
        }
        Ok(())
    }

    pub async fn close(&self, stream_path: &str) {
        let mut subs = self.subs.write().await;
        if let Some(sub) = subs.remove(stream_path) {
            sub.close();
        }
    }

    /// Publishes an inserted array to the subscription on `stream`, if one
    /// exists. Absent subscriptions are silently dropped — not every
    /// stream has a listener.
    pub async fn publish(&self, stream: &str, substream: &str, array: &DatapointArray) {
        let subs = self.subs.read().await;
        if let Some(sub) = subs.get(stream) {
            sub.publish(stream, substream, array);
        }
    }

    /// Heartbeat: revalidates every subscription against `check` (caller
    /// supplies the external catalog lookup), closing and removing any
    /// that fail, or that have already torn themselves down.
    pub async fn revalidate(&self, check: impl Fn(&str) -> bool) {
        let stale: Vec<String> = {
            let subs = self.subs.read().await;
            subs.iter()
                .filter(|(path, sub)| sub.is_closed() || !check(path))
                .map(|(path, _)| path.clone())
                .collect()
        };
        for path in stale {
            self.close(&path).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.subs.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_codec::Datapoint;

    fn arr(points: &[f64]) -> DatapointArray {
        DatapointArray::from_vec(points.iter().map(|&ts| Datapoint::new(ts, ts, "")).collect())
    }

    #[tokio::test]
    async fn publish_reaches_the_registered_pass_through() {
        let table = SubscriptionTable::new();
        let mut rx = table.register("h1:mystream", SubConfig::default()).await;
        table.add_transform("h1:mystream", "", None).await.unwrap();

        table.publish("h1:mystream", "", &arr(&[1.0])).await;

        use tokio_stream::StreamExt;
        let envelope = rx.next().await.unwrap();
        assert_eq!(envelope.stream, "h1:mystream");
    }

    #[tokio::test]
    async fn publish_to_unknown_stream_is_a_no_op() {
        let table = SubscriptionTable::new();
        table.publish("nobody-here", "", &arr(&[1.0])).await;
    }

    #[tokio::test]
    async fn revalidate_closes_subscriptions_failing_the_check() {
        let table = SubscriptionTable::new();
        table.register("h1:mystream", SubConfig::default()).await;
        assert_eq!(table.len().await, 1);

        table.revalidate(|_| false).await;
        assert_eq!(table.len().await, 0);
    }

    #[tokio::test]
    async fn remove_last_transform_tears_down_the_subscription() {
        let table = SubscriptionTable::new();
        table.register("h1:mystream", SubConfig::default()).await;
        table.add_transform("h1:mystream", "only", None).await.unwrap();

        table.remove_transform("h1:mystream", "only").await.unwrap();
        assert_eq!(table.len().await, 0);
    }
}
