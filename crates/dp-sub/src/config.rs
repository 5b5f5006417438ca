//! Subscriber tuning knobs.

use std::time::Duration;

/// Configuration for one subscriber's delivery channel.
///
/// `write_wait`/`pong_wait`/`ping_period` describe a websocket transport's
/// keepalive cadence the way the original implementation configured it;
/// this crate has no transport of its own, so they are threaded through
/// unused today, ready for whatever carries `Envelope`s to a real socket.
#[derive(Debug, Clone, Copy)]
pub struct SubConfig {
    /// Bounded delivery channel depth. Exceeding it tears the subscriber
    /// down with `SubError::BackpressureDropped`.
    pub message_buffer: usize,
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
}

impl Default for SubConfig {
    fn default() -> Self {
        Self {
            message_buffer: 64,
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
        }
    }
}

impl SubConfig {
    pub fn with_message_buffer(mut self, depth: usize) -> Self {
        self.message_buffer = depth;
        self
    }
}
