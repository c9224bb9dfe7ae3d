use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, LogPosition, PositionedEvent, Result, Snapshot,
    Version,
};

/// Concurrency expectation attached to an append.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must be at before the append.
    /// `None` skips the check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// No version check.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// The stream must not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }

    /// Expects `version`, treating the initial version as "stream is new".
    pub fn expecting(version: Version) -> Self {
        if version == Version::initial() {
            Self::expect_new()
        } else {
            Self::expect_version(version)
        }
    }
}

/// Events destined for one stream inside a multi-stream append.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl StreamAppend {
    pub fn new(events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self { events, options }
    }

    /// The stream this append targets, taken from its first event.
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        self.events.first().map(|e| e.aggregate_id)
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// A stream of events with their log positions.
pub type PositionedStream = Pin<Box<dyn Stream<Item = Result<PositionedEvent>> + Send>>;

/// Storage backend for event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends to several streams as one unit.
    ///
    /// Either every stream's events are written or none are. Each stream's
    /// expected version is checked under the same lock or transaction, so a
    /// conflict on any stream aborts the whole batch with
    /// `ConcurrencyConflict`.
    ///
    /// Returns the new version of each stream, in input order.
    async fn append_streams(&self, appends: Vec<StreamAppend>) -> Result<Vec<Version>>;

    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let versions = self
            .append_streams(vec![StreamAppend::new(events, options)])
            .await?;
        versions
            .into_iter()
            .next()
            .ok_or_else(|| EventStoreError::InvalidAppend("no stream version returned".into()))
    }

    /// Retrieves all events for an aggregate in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events for an aggregate from `from_version` (inclusive).
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Streams the events committed after `position`, in commit order.
    async fn stream_events_after(&self, position: LogPosition) -> Result<PositionedStream>;

    /// Streams every event in commit order.
    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        let events = self.stream_events_after(LogPosition::start()).await?;
        Ok(Box::pin(events.map(|read| read.map(|positioned| positioned.event))))
    }

    /// Current version of a stream, or `None` if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Saves a snapshot, replacing any previous one for the aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Convenience methods available on every [`EventStore`].
#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads the latest snapshot (if any) and the events written after it.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(aggregate_id).await? {
            let events = self
                .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.get_events_for_aggregate(aggregate_id).await?;
            Ok((None, events))
        }
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks a batch before any backend touches storage.
///
/// Every stream must be non-empty, single-aggregate and sequentially
/// versioned, and no aggregate may appear in two entries of the batch.
pub(crate) fn validate_batch(appends: &[StreamAppend]) -> Result<()> {
    if appends.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".into(),
        ));
    }

    let mut seen = HashSet::new();
    for append in appends {
        validate_stream(&append.events)?;
        let aggregate_id = append.events[0].aggregate_id;
        if !seen.insert(aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "aggregate {aggregate_id} appears twice in one batch"
            )));
        }
    }
    Ok(())
}

fn validate_stream(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".into(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events of a stream append must target the same aggregate".into(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {expected_version}, got {}",
                event.version
            )));
        }
    }
    Ok(())
}
