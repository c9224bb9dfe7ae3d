//! The projection trait and the checkpoint each view keeps.

use async_trait::async_trait;
use event_store::{LogPosition, PositionedEvent};

use crate::Result;

/// The last log position a view has applied.
///
/// Delivery is at-least-once; a view drops anything at or before its
/// checkpoint, so replays and overlapping catch-ups change nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub position: LogPosition,
}

impl Checkpoint {
    pub fn start() -> Self {
        Self::default()
    }

    /// True if the event at `position` has already been applied.
    pub fn covers(&self, position: LogPosition) -> bool {
        position <= self.position
    }

    /// Moves the checkpoint to `position` unless it is already covered.
    /// Returns whether the event at `position` is new.
    pub fn claim(&mut self, position: LogPosition) -> bool {
        if self.covers(position) {
            return false;
        }
        self.position = position;
        true
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "checkpoint({})", self.position)
    }
}

/// A read model fed from the global event log.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies one event. Events at or before the checkpoint are ignored.
    async fn apply(&self, event: &PositionedEvent) -> Result<()>;

    async fn checkpoint(&self) -> Checkpoint;

    /// Drops all state and moves the checkpoint back to the start.
    async fn reset(&self) -> Result<()>;
}
