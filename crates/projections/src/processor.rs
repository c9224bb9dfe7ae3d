//! Projection processor for feeding events to projections.

use event_store::{EventStore, LogPosition};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Feeds the global event log to registered projections.
///
/// The processor supports:
/// - Catch-up: reads only the events after the lowest view checkpoint
/// - Rebuild: resets all projections and replays from the start
///
/// Runs are serialized, and each view skips what its checkpoint covers, so
/// overlapping callers never apply an event twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    running: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            running: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the head of the log.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let _running = self.running.lock().await;
        self.catch_up().await
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        let _running = self.running.lock().await;
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.catch_up().await
    }

    async fn catch_up(&self) -> Result<()> {
        let Some(from) = self.lowest_checkpoint().await else {
            return Ok(());
        };

        let mut stream = self.store.stream_events_after(from).await?;
        let mut read: u64 = 0;
        while let Some(result) = stream.next().await {
            let event = result?;
            for projection in &self.projections {
                projection.apply(&event).await?;
            }
            read += 1;
        }

        if read > 0 {
            metrics::counter!("projections_events_processed").increment(read);
        }
        tracing::debug!(%from, events_read = read, "catch-up complete");
        Ok(())
    }

    async fn lowest_checkpoint(&self) -> Option<LogPosition> {
        let mut lowest: Option<LogPosition> = None;
        for projection in &self.projections {
            let position = projection.checkpoint().await.position;
            lowest = Some(lowest.map_or(position, |low| low.min(position)));
        }
        lowest
    }
}
