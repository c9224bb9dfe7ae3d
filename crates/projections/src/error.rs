//! Projection error types.

use event_store::LogPosition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A stored order event no longer matches the current event schema.
    #[error("Unreadable {event_type} at log position {position}: {source}")]
    UnreadableEvent {
        event_type: String,
        position: LogPosition,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
