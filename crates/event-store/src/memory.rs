use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, LogPosition, PositionedEvent, Result, Snapshot,
    Version,
    store::{EventStore, PositionedStream, StreamAppend, validate_batch},
};

#[derive(Default)]
struct Log {
    /// Every event in commit order; the event at index `i` has position `i + 1`.
    events: Vec<EventEnvelope>,
    /// Current head of each stream.
    heads: HashMap<AggregateId, Version>,
}

impl Log {
    fn head(&self, aggregate_id: AggregateId) -> Version {
        self.heads
            .get(&aggregate_id)
            .copied()
            .unwrap_or_else(Version::initial)
    }
}

/// Event store kept entirely in process memory.
///
/// Used by tests and by the API when no database is configured. A single
/// write lock guards the whole log, which makes multi-stream appends atomic.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_streams(&self, appends: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&appends)?;

        let mut log = self.log.write().await;

        // Check every stream before writing any of them.
        for append in &appends {
            let first = &append.events[0];
            let current = log.head(first.aggregate_id);

            if let Some(expected) = append.options.expected_version
                && current != expected
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id,
                    expected,
                    actual: current,
                });
            }

            if first.version != current.next() {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id,
                    expected: append.options.expected_version.unwrap_or(current),
                    actual: current,
                });
            }
        }

        let mut versions = Vec::with_capacity(appends.len());
        for append in appends {
            let aggregate_id = append.events[0].aggregate_id;
            let last = append.events[append.events.len() - 1].version;
            log.heads.insert(aggregate_id, last);
            log.events.extend(append.events);
            versions.push(last);
        }

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_events_for_aggregate_from_version(aggregate_id, Version::first())
            .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn stream_events_after(&self, position: LogPosition) -> Result<PositionedStream> {
        use futures_util::stream;

        let skip = usize::try_from(position.as_i64()).unwrap_or(0);
        let events: Vec<Result<PositionedEvent>> = self
            .log
            .read()
            .await
            .events
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(index, event)| {
                Ok(PositionedEvent {
                    position: LogPosition::new(index as i64 + 1),
                    event: event.clone(),
                })
            })
            .collect();
        Ok(Box::pin(stream::iter(events)))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.heads.get(&aggregate_id).copied())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.read().await.get(&aggregate_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AppendOptions;

    fn event(aggregate_id: AggregateId, aggregate_type: &str, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(aggregate_type)
            .event_type(format!("{aggregate_type}Changed"))
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"seq": version}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_and_read_back_in_version_order() {
        let store = InMemoryEventStore::new();
        let cart = AggregateId::new();

        let version = store
            .append(
                vec![event(cart, "Cart", 1), event(cart, "Cart", 2)],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        assert_eq!(version, Version::new(2));

        let events = store.get_events_for_aggregate(cart).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].version, Version::new(2));
        assert_eq!(
            store.get_aggregate_version(cart).await.unwrap(),
            Some(Version::new(2))
        );
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let order = AggregateId::new();
        store
            .append(vec![event(order, "Order", 1)], AppendOptions::expect_new())
            .await
            .unwrap();

        let result = store
            .append(
                vec![event(order, "Order", 2)],
                AppendOptions::expect_version(Version::initial()),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { actual, .. }) if actual == Version::first()
        ));
    }

    #[tokio::test]
    async fn unchecked_append_still_rejects_version_reuse() {
        let store = InMemoryEventStore::new();
        let order = AggregateId::new();
        store
            .append(vec![event(order, "Order", 1)], AppendOptions::new())
            .await
            .unwrap();

        let result = store
            .append(vec![event(order, "Order", 1)], AppendOptions::new())
            .await;
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn multi_stream_append_commits_all_streams() {
        let store = InMemoryEventStore::new();
        let cart = AggregateId::new();
        let order = AggregateId::new();
        store
            .append(
                vec![event(cart, "Cart", 1), event(cart, "Cart", 2)],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let versions = store
            .append_streams(vec![
                StreamAppend::new(vec![event(order, "Order", 1)], AppendOptions::expect_new()),
                StreamAppend::new(
                    vec![event(cart, "Cart", 3)],
                    AppendOptions::expect_version(Version::new(2)),
                ),
            ])
            .await
            .unwrap();

        assert_eq!(versions, vec![Version::first(), Version::new(3)]);
        assert_eq!(store.event_count().await, 4);
    }

    #[tokio::test]
    async fn multi_stream_conflict_writes_nothing() {
        let store = InMemoryEventStore::new();
        let cart = AggregateId::new();
        let order = AggregateId::new();
        store
            .append(vec![event(cart, "Cart", 1)], AppendOptions::expect_new())
            .await
            .unwrap();

        // Cart moved on to version 1; the writer still believes it is new.
        let result = store
            .append_streams(vec![
                StreamAppend::new(vec![event(order, "Order", 1)], AppendOptions::expect_new()),
                StreamAppend::new(vec![event(cart, "Cart", 1)], AppendOptions::expect_new()),
            ])
            .await;

        assert!(result.unwrap_err().is_conflict());
        assert_eq!(store.get_aggregate_version(order).await.unwrap(), None);
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn reads_from_version_for_snapshot_replay() {
        let store = InMemoryEventStore::new();
        let cart = AggregateId::new();
        store
            .append(
                (1..=3).map(|v| event(cart, "Cart", v)).collect(),
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let tail = store
            .get_events_for_aggregate_from_version(cart, Version::new(2))
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].version, Version::new(2));
    }

    #[tokio::test]
    async fn stream_all_events_follows_commit_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let first = AggregateId::new();
        let second = AggregateId::new();
        store
            .append(vec![event(first, "Order", 1)], AppendOptions::new())
            .await
            .unwrap();
        store
            .append(vec![event(second, "Cart", 1)], AppendOptions::new())
            .await
            .unwrap();
        store
            .append(vec![event(first, "Order", 2)], AppendOptions::new())
            .await
            .unwrap();

        let events: Vec<_> = store.stream_all_events().await.unwrap().collect().await;
        let ids: Vec<_> = events
            .into_iter()
            .map(|e| e.unwrap().aggregate_id)
            .collect();
        assert_eq!(ids, vec![first, second, first]);
    }

    #[tokio::test]
    async fn stream_after_position_skips_seen_events() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let order = AggregateId::new();
        for version in 1..=3 {
            store
                .append(vec![event(order, "Order", version)], AppendOptions::new())
                .await
                .unwrap();
        }

        let tail: Vec<_> = store
            .stream_events_after(LogPosition::new(1))
            .await
            .unwrap()
            .map(|read| read.unwrap())
            .collect()
            .await;
        let seen: Vec<_> = tail
            .iter()
            .map(|p| (p.position.as_i64(), p.event.version.as_i64()))
            .collect();
        assert_eq!(seen, vec![(2, 2), (3, 3)]);

        let caught_up = store
            .stream_events_after(LogPosition::new(3))
            .await
            .unwrap()
            .count()
            .await;
        assert_eq!(caught_up, 0);
    }

    #[tokio::test]
    async fn snapshot_replaces_previous() {
        let store = InMemoryEventStore::new();
        let cart = AggregateId::new();
        assert!(store.get_snapshot(cart).await.unwrap().is_none());

        for version in [50, 100] {
            store
                .save_snapshot(Snapshot::new(
                    cart,
                    "Cart",
                    Version::new(version),
                    serde_json::json!({"lines": []}),
                ))
                .await
                .unwrap();
        }

        let snapshot = store.get_snapshot(cart).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(100));
    }
}
