//! Todo read model storage.

pub mod postgres;
pub mod todo_store;

pub use postgres::PostgresTodoStore;
pub use todo_store::{
    Decide, IgnoreReason, InMemoryTodoStore, RowState, StoreError, TodoRow, TodoStore, Transition,
};
