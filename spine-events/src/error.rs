//! Error types for the event layer.

use spine_types::ListenId;
use thiserror::Error;

/// Result type for event operations.
pub type EventsResult<T> = Result<T, EventsError>;

/// Errors that can occur while wiring subscriptions.
///
/// Triggering and unbinding never fail. Only subscribing to a foreign
/// [`Listenable`](crate::Listenable) can, and the listener's bookkeeping is
/// rolled back before the error reaches the caller.
#[derive(Debug, Error)]
pub enum EventsError {
    /// The listenee refused the subscription.
    #[error("subscription to {target} failed: {reason}")]
    Subscribe { target: ListenId, reason: String },
}
