//! Command handling infrastructure.
//!
//! A command is a closure that inspects the current aggregate and returns the
//! events it wants recorded. [`CommandHandler`] loads the aggregate, runs the
//! closure and appends the events at the version it loaded, so a concurrent
//! writer shows up as a `ConcurrencyConflict` instead of a lost update.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, StreamAppend, Version,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Attempts made by [`CommandHandler::execute_with_retry`] callers by default.
pub const DEFAULT_COMMAND_ATTEMPTS: usize = 3;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// Events persisted by this command. Empty for an idempotent no-op.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// True when the command changed nothing.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// A decided command whose events have not been written yet.
///
/// Used when one operation must commit several streams together through
/// [`EventStore::append_streams`].
#[derive(Debug)]
pub struct PreparedCommand<A: Aggregate> {
    /// State the aggregate will have once `append` commits.
    pub aggregate: A,
    pub events: Vec<A::Event>,
    pub append: StreamAppend,
}

impl<A: Aggregate> PreparedCommand<A> {
    /// Converts into a [`CommandResult`] once the batch has committed.
    pub fn committed(self, new_version: Version) -> CommandResult<A> {
        let mut aggregate = self.aggregate;
        aggregate.set_version(new_version);
        CommandResult {
            aggregate,
            events: self.events,
            new_version,
        }
    }
}

/// Marker for command structs that target one aggregate instance.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn aggregate_id(&self) -> AggregateId;
}

/// Loads aggregates from the store and persists the events commands produce.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate + DeserializeOwned,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds an aggregate from its latest snapshot and later events.
    ///
    /// A stream with no events yields `A::default()`.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => Self::restore_from_snapshot(snapshot)?,
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Like [`load`](Self::load) but returns `None` for an empty stream.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Runs a command once against freshly loaded state.
    ///
    /// A command that returns no events is a no-op: nothing is appended and
    /// the version does not move.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let PreparedCommand {
            aggregate,
            events,
            append,
        } = self.prepare(aggregate, aggregate_id, events, None)?;
        let new_version = self.store.append(append.events, append.options).await?;

        let mut aggregate = aggregate;
        aggregate.set_version(new_version);
        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Runs a command, reloading and deciding again after a concurrency
    /// conflict, up to `max_attempts` times in total.
    pub async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        max_attempts: usize,
        mut command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnMut(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 1;
        loop {
            match self.execute(aggregate_id, &mut command_fn).await {
                Err(err) if err.is_conflict() && attempt < max_attempts => {
                    tracing::warn!(
                        aggregate_type = A::aggregate_type(),
                        %aggregate_id,
                        attempt,
                        "concurrent write detected, retrying command"
                    );
                    metrics::counter!("command_retries_total", "aggregate" => A::aggregate_type())
                        .increment(1);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Applies `events` to `aggregate` and builds the append for them without
    /// writing anything.
    pub fn prepare(
        &self,
        mut aggregate: A,
        aggregate_id: AggregateId,
        events: Vec<A::Event>,
        correlation_id: Option<Uuid>,
    ) -> Result<PreparedCommand<A>, DomainError> {
        let current_version = aggregate.version();
        let envelopes =
            Self::build_envelopes(aggregate_id, current_version, &events, correlation_id)?;

        for event in &events {
            aggregate.apply(event.clone());
        }

        Ok(PreparedCommand {
            aggregate,
            events,
            append: StreamAppend::new(envelopes, AppendOptions::expecting(current_version)),
        })
    }

    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
        correlation_id: Option<Uuid>,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut version = current_version;
        events
            .iter()
            .map(|event| {
                version = version.next();
                let mut builder = EventEnvelope::builder()
                    .aggregate_id(aggregate_id)
                    .aggregate_type(A::aggregate_type())
                    .event_type(event.event_type())
                    .version(version)
                    .payload(event)?;
                if let Some(correlation_id) = correlation_id {
                    builder = builder.correlation_id(correlation_id);
                }
                Ok(builder.build()?)
            })
            .collect()
    }

    fn restore_from_snapshot(snapshot: Snapshot) -> Result<A, DomainError> {
        let version = snapshot.version;
        let mut aggregate: A = snapshot.into_state()?;
        aggregate.set_version(version);
        Ok(aggregate)
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Executes a command and saves a snapshot when the new version lands on
    /// the aggregate's snapshot interval.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self.execute(aggregate_id, command_fn).await?;
        self.snapshot_if_due(aggregate_id, &result).await?;
        Ok(result)
    }

    /// Saves a snapshot for `result` if one is due.
    pub async fn snapshot_if_due(
        &self,
        aggregate_id: AggregateId,
        result: &CommandResult<A>,
    ) -> Result<(), DomainError> {
        if !result.is_noop() && result.aggregate.should_snapshot() {
            let snapshot = Snapshot::from_state(
                aggregate_id,
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            )?;
            self.store.save_snapshot(snapshot).await?;
            tracing::debug!(%aggregate_id, version = %result.new_version, "snapshot saved");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::InMemoryEventStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TallyEvent {
        Opened { label: String },
        Bumped { by: i32 },
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TallyEvent::Opened { .. } => "TallyOpened",
                TallyEvent::Bumped { .. } => "TallyBumped",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Tally {
        id: Option<AggregateId>,
        label: String,
        value: i32,
        #[serde(skip)]
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("tally rejected")]
    struct TallyError;

    impl From<TallyError> for DomainError {
        fn from(_: TallyError) -> Self {
            DomainError::Serialization(serde_json::Error::io(std::io::Error::other(
                "tally rejected",
            )))
        }
    }

    impl Aggregate for Tally {
        type Event = TallyEvent;
        type Error = TallyError;

        fn aggregate_type() -> &'static str {
            "Tally"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TallyEvent::Opened { label } => {
                    self.id.get_or_insert_with(AggregateId::new);
                    self.label = label;
                }
                TallyEvent::Bumped { by } => self.value += by,
            }
        }
    }

    impl SnapshotCapable for Tally {
        fn snapshot_interval() -> usize {
            2
        }
    }

    fn open(label: &str) -> Vec<TallyEvent> {
        vec![TallyEvent::Opened {
            label: label.to_string(),
        }]
    }

    #[tokio::test]
    async fn test_execute_appends_at_loaded_version() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        handler.execute(id, |_| Ok(open("hits"))).await.unwrap();
        let result = handler
            .execute(id, |_| Ok(vec![TallyEvent::Bumped { by: 2 }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 2);
        assert_eq!(handler.load(id).await.unwrap().value, 2);
    }

    #[tokio::test]
    async fn test_rejected_command_appends_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());

        let result = handler.execute(AggregateId::new(), |_| Err(TallyError)).await;

        assert!(result.is_err());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_decision_is_a_noop() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());

        let result = handler.execute(AggregateId::new(), |_| Ok(vec![])).await.unwrap();

        assert!(result.is_noop());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_load_existing_distinguishes_empty_streams() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        assert!(handler.load_existing(id).await.unwrap().is_none());
        handler.execute(id, |_| Ok(open("visits"))).await.unwrap();
        assert_eq!(handler.load_existing(id).await.unwrap().unwrap().label, "visits");
    }

    #[tokio::test]
    async fn test_retry_redecides_after_conflict() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let rival: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        handler.execute(id, |_| Ok(open("race"))).await.unwrap();

        // The first decision is overtaken by a rival write before it appends.
        let mut calls = 0;
        let result = handler
            .execute_with_retry(id, DEFAULT_COMMAND_ATTEMPTS, |tally| {
                calls += 1;
                if calls == 1 {
                    let rival_events = vec![TallyEvent::Bumped { by: 10 }];
                    let prepared = rival
                        .prepare(tally.clone(), id, rival_events, None)
                        .unwrap();
                    futures_executor_append(&store, prepared.append);
                }
                Ok(vec![TallyEvent::Bumped { by: 1 }])
            })
            .await
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(result.aggregate.value, 11);
        assert_eq!(result.new_version, Version::new(3));
    }

    /// Appends from inside a synchronous command closure.
    fn futures_executor_append(store: &InMemoryEventStore, append: StreamAppend) {
        let store = store.clone();
        std::thread::spawn(move || {
            tokio::runtime::Runtime::new()
                .unwrap()
                .block_on(store.append_streams(vec![append]))
                .unwrap();
        })
        .join()
        .unwrap();
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let rival: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        handler.execute(id, |_| Ok(open("busy"))).await.unwrap();

        // Every decision is overtaken.
        let mut calls = 0;
        let result = handler
            .execute_with_retry(id, 2, |tally| {
                calls += 1;
                let prepared = rival
                    .prepare(tally.clone(), id, vec![TallyEvent::Bumped { by: 10 }], None)
                    .unwrap();
                futures_executor_append(&store, prepared.append);
                Ok(vec![TallyEvent::Bumped { by: 1 }])
            })
            .await;

        assert_eq!(calls, 2);
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_prepare_builds_correlated_append_without_writing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        let correlation = Uuid::new_v4();

        let prepared = handler
            .prepare(Tally::default(), id, open("prepared"), Some(correlation))
            .unwrap();

        assert_eq!(store.event_count().await, 0);
        assert_eq!(prepared.aggregate.label, "prepared");
        assert_eq!(
            prepared.append.options.expected_version,
            Some(Version::initial())
        );
        assert_eq!(prepared.append.events[0].correlation_id(), Some(correlation));

        let versions = store.append_streams(vec![prepared.append.clone()]).await.unwrap();
        let result = prepared.committed(versions[0]);
        assert_eq!(result.aggregate.version(), Version::first());
    }

    #[tokio::test]
    async fn test_snapshot_saved_on_interval() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        handler.execute_with_snapshot(id, |_| Ok(open("snap"))).await.unwrap();
        assert!(store.get_snapshot(id).await.unwrap().is_none());

        handler
            .execute_with_snapshot(id, |_| Ok(vec![TallyEvent::Bumped { by: 5 }]))
            .await
            .unwrap();
        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(2));

        handler
            .execute_with_snapshot(id, |_| Ok(vec![TallyEvent::Bumped { by: 1 }]))
            .await
            .unwrap();
        let reloaded = handler.load(id).await.unwrap();
        assert_eq!(reloaded.value, 6);
        assert_eq!(reloaded.version(), Version::new(3));
    }
}
