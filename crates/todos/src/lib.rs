//! Todo domain module (event-sourced write path).
//!
//! This crate contains the todo event vocabulary, command validation and the
//! event schema registry, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod command;
pub mod event;
pub mod schema;

pub use command::TodoCommand;
pub use event::{
    TODO_FLOW, TodoCompleted, TodoCreated, TodoDeleted, TodoEvent, TodoRenamed, TodoReopened,
};
pub use schema::{SchemaError, SchemaRegistry, TodoEventType};
