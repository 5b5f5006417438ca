//! The bounded per-subscriber delivery channel.

use crate::error::SubError;
use crate::transform::Envelope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Shared closed-flag between a `SubscriberSender` and the stream it feeds,
/// so a torn-down subscription is observable from either side without a
/// round trip through the channel itself.
#[derive(Debug, Default)]
pub(crate) struct ClosedFlag(AtomicBool);

impl ClosedFlag {
    fn close(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The send half of one subscriber's delivery channel. Overflowing the
/// bounded channel tears the subscriber down rather than blocking the
/// publisher — a slow reader must not stall delivery to everyone else.
pub struct SubscriberSender {
    tx: mpsc::Sender<Envelope>,
    closed: Arc<ClosedFlag>,
}

impl SubscriberSender {
    pub(crate) fn new(depth: usize) -> (Self, ReceiverStream<Envelope>) {
        let (tx, rx) = mpsc::channel(depth);
        let closed = Arc::new(ClosedFlag::default());
        (Self { tx, closed }, ReceiverStream::new(rx))
    }

    /// Attempts to hand `envelope` to the subscriber without waiting.
    /// On overflow, marks this sender closed and returns
    /// `SubError::BackpressureDropped` — the caller tears the whole
    /// subscription down in response.
    pub fn try_send(&self, envelope: Envelope) -> Result<(), SubError> {
        if self.closed.is_closed() {
            return Err(SubError::Closed);
        }
        match self.tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.closed.close();
                Err(SubError::BackpressureDropped)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.closed.close();
                Err(SubError::Closed)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_closed() || self.tx.is_closed()
    }

    pub fn close(&self) {
        self.closed.close();
    }
}
