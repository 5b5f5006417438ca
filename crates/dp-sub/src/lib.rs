//! Subscription bus (C6): publishes inserted arrays to interested readers
//! through per-subscriber transform chains, with bounded delivery channels
//! and backpressure-driven teardown.

mod config;
mod error;
mod sender;
mod subscription;
mod table;
mod transform;

pub use config::SubConfig;
pub use error::SubError;
pub use sender::SubscriberSender;
pub use subscription::Subscription;
pub use table::SubscriptionTable;
pub use transform::{Envelope, TransformHandle};

// Re-export the stream combinators callers need to drive a subscriber's
// read loop, matching the teacher's convenience re-export of its async
// stream adapter crate.
pub use tokio_stream::StreamExt;
