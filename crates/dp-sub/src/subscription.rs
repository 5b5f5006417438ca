//! One subscriber's transform map and delivery channel.

use crate::error::SubError;
use crate::sender::SubscriberSender;
use crate::transform::{Envelope, TransformHandle};
use dp_codec::DatapointArray;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A single subscription to one stream: a delivery channel plus the set
/// of transform expressions currently registered against it. `None` in
/// the map means the pass-through (`expr == ""`) entry.
pub struct Subscription {
    sender: SubscriberSender,
    transforms: Mutex<HashMap<String, Option<TransformHandle>>>,
    closed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(sender: SubscriberSender) -> Self {
        Self {
            sender,
            transforms: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Registers `expr` with its compiled `handle` (`None` for
    /// pass-through). Rejects re-registering an expression already present.
    pub fn add(&self, expr: impl Into<String>, handle: Option<TransformHandle>) -> Result<(), SubError> {
        let expr = expr.into();
        let mut transforms = self.transforms.lock().unwrap();
        if transforms.contains_key(&expr) {
            return Err(SubError::DuplicateTransform);
        }
        transforms.insert(expr, handle);
        Ok(())
    }

    /// Removes `expr`. Returns `true` if the transform set is now empty,
    /// meaning the caller (the owning table) may tear this subscription
    /// down.
    pub fn remove(&self, expr: &str) -> Result<bool, SubError> {
        let mut transforms = self.transforms.lock().unwrap();
        if transforms.remove(expr).is_none() {
            return Err(SubError::UnknownTransform);
        }
        Ok(transforms.is_empty())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.sender.close();
    }

    /// Evaluates every registered transform over `array` and delivers one
    /// envelope per expression that produced non-empty output. Runs
    /// exclusively with `add`/`remove` so delivery never observes a
    /// transform set mid-mutation.
    ///
    /// A transform panic-free failure path doesn't exist here (handles
    /// are plain `Fn`, not fallible) — the failure mode spec.md describes
    /// for "transform evaluation fails" is instead surfaced by the
    /// backpressure teardown below, which is the only way delivery can
    /// fail once a handle has run.
    pub(crate) fn publish(&self, stream: &str, substream: &str, array: &DatapointArray) {
        if self.is_closed() {
            return;
        }
        let transforms = self.transforms.lock().unwrap();
        for (expr, handle) in transforms.iter() {
            let data = match handle {
                None => array.clone(),
                Some(f) => f(array),
            };
            if data.is_empty() && !expr.is_empty() {
                continue;
            }
            let envelope = Envelope {
                stream: stream.to_string(),
                substream: substream.to_string(),
                transform: expr.clone(),
                data,
            };
            if let Err(e) = self.sender.try_send(envelope) {
                eprintln!("dp-sub: dropping subscriber on stream {stream:?}: {e}");
                drop(transforms);
                self.close();
                return;
            }
        }
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
    async fn pass_through_forwards_verbatim() {
        let (sender, mut stream) = SubscriberSender::new(4);
        let sub = Subscription::new(sender);
        sub.add("", None).unwrap();

        sub.publish("mystream", "", &arr(&[1.0, 2.0]));

        use tokio_stream::StreamExt;
        let envelope = stream.next().await.unwrap();
        assert_eq!(envelope.transform, "");
        assert_eq!(envelope.data.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_transform_is_rejected() {
        let (sender, _stream) = SubscriberSender::new(4);
        let sub = Subscription::new(sender);
        sub.add("expr", None).unwrap();
        assert!(matches!(sub.add("expr", None), Err(SubError::DuplicateTransform)));
    }

    #[tokio::test]
    async fn empty_transform_output_emits_nothing() {
        let (sender, mut stream) = SubscriberSender::new(4);
        let sub = Subscription::new(sender);
        let always_empty: TransformHandle = std::sync::Arc::new(|_: &DatapointArray| DatapointArray::new());
        sub.add("drop-all", Some(always_empty)).unwrap();

        sub.publish("mystream", "", &arr(&[1.0]));

        // Give the bounded channel a moment; nothing should have been sent.
        let received = tokio::time::timeout(std::time::Duration::from_millis(20), {
            use tokio_stream::StreamExt;
            stream.next()
        })
        .await;
        assert!(received.is_err(), "expected no delivery for an all-empty transform");
    }

    #[tokio::test]
    async fn overflow_tears_down_the_subscription() {
        let (sender, _stream) = SubscriberSender::new(1);
        let sub = Subscription::new(sender);
        sub.add("", None).unwrap();

        sub.publish("mystream", "", &arr(&[1.0]));
        sub.publish("mystream", "", &arr(&[2.0]));

        assert!(sub.is_closed());
    }
}
