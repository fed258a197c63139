//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are:
//! - **Idempotent**: Safe for at-least-once delivery
//! - **Order-tolerant**: Out-of-order deliveries never corrupt a row
//! - **Stateless**: Everything they need is re-read from the store per event

pub mod todos;

pub use todos::{ProjectionError, ProjectionOutcome, TodoProjector};
