//! Read models and projections for the query side.
//!
//! This crate provides:
//! - [`Projection`] trait for applying logged events to a view
//! - [`Checkpoint`], the log position each view has reached
//! - [`ProjectionProcessor`] for feeding the log to views from their checkpoints
//! - Two views: each user's order listing and each order's status timeline

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Checkpoint, Projection};
pub use views::{OrderHistoryView, OrderSummary, OrderTimeline, TimelineEntry, UserOrdersView};
