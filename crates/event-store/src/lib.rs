//! Append-only event storage for the storefront.
//!
//! Every cart, order and customer is a stream of [`EventEnvelope`]s keyed by
//! its [`AggregateId`]. Writers append with an expected version; several
//! streams can be appended in one all-or-nothing batch via
//! [`EventStore::append_streams`], which is how checkout places an order and
//! drains the cart together.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{
    EventEnvelope, EventEnvelopeBuilder, EventId, LogPosition, PositionedEvent, Version,
};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{
    AppendOptions, EventStore, EventStoreExt, EventStream, PositionedStream, StreamAppend,
};
