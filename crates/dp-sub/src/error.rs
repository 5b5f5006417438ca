//! Errors for subscription operations.

use thiserror::Error;

/// Errors that can occur against a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubError {
    /// The subscription's delivery channel has been torn down.
    #[error("subscription is closed")]
    Closed,

    /// `Add` was called twice with the same transform expression.
    #[error("transform already registered for this subscription")]
    DuplicateTransform,

    /// `Remove` referenced an expression that was never added.
    #[error("no such transform registered")]
    UnknownTransform,

    /// A slow subscriber overflowed its bounded delivery channel and was
    /// torn down as a result.
    #[error("subscriber overflowed its delivery channel and was dropped")]
    BackpressureDropped,
}

impl SubError {
    /// Whether this error means the subscription no longer exists and
    /// should be removed from its owning table.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::BackpressureDropped)
    }
}
