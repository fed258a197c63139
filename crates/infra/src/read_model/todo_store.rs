use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use todoflow_core::AggregateId;

/// Queryable todo read model: one row per live aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoRow {
    pub id: AggregateId,
    pub title: String,
    pub description: String,
    pub done: bool,
    /// Highest envelope sequence applied to this row, when the platform sends one.
    pub last_sequence: Option<u64>,
}

/// What the store currently holds for an aggregate id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowState {
    /// No row and never deleted.
    Absent,
    Active(TodoRow),
    /// No row, and a tombstone records that it was deleted.
    Deleted,
}

/// Why a transition wrote nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Created redelivered with the same payload.
    DuplicateCreate,
    /// Created for an id that already exists with different content; first Created wins.
    ConflictingCreate,
    /// Event for an id that has no row (not created yet, or never will be).
    UnknownAggregate,
    /// Event for an id that was deleted.
    Tombstoned,
    /// Event already reflected in the row.
    Unchanged,
    /// Envelope sequence not newer than what the row already reflects.
    Stale { last: u64, found: u64 },
}

impl core::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IgnoreReason::DuplicateCreate => f.write_str("duplicate create"),
            IgnoreReason::ConflictingCreate => f.write_str("conflicting create"),
            IgnoreReason::UnknownAggregate => f.write_str("unknown aggregate"),
            IgnoreReason::Tombstoned => f.write_str("aggregate deleted"),
            IgnoreReason::Unchanged => f.write_str("unchanged"),
            IgnoreReason::Stale { last, found } => write!(f, "stale (last={last}, found={found})"),
        }
    }
}

/// Write decided for one aggregate, given its current [`RowState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Insert(TodoRow),
    Update(TodoRow),
    /// Hard-delete the row and record a tombstone.
    Delete,
    Ignore(IgnoreReason),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("database error in {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("store operation timed out after {0} ms")]
    Timeout(u64),

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Decision callback run inside a store transaction.
pub type Decide<'a> = &'a (dyn Fn(&RowState) -> Transition + Send + Sync);

/// Transactional row store backing the todo read model.
///
/// `transact` is the only write path: it reads the current state of one id,
/// asks `decide` for a transition and writes the result, atomically with
/// respect to any other `transact` call for the same id. Calls for different
/// ids do not wait on each other beyond what the backend requires.
///
/// Implementations must not cache rows in-process; every call observes the
/// backend's current state so multiple processes can share one store.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn get(&self, id: &AggregateId) -> Result<Option<TodoRow>, StoreError>;

    /// All rows, ordered by id.
    async fn list(&self) -> Result<Vec<TodoRow>, StoreError>;

    /// Read-decide-write for one id. Returns the transition that was applied.
    async fn transact(&self, id: &AggregateId, decide: Decide<'_>) -> Result<Transition, StoreError>;
}

#[async_trait]
impl<S> TodoStore for Arc<S>
where
    S: TodoStore + ?Sized,
{
    async fn get(&self, id: &AggregateId) -> Result<Option<TodoRow>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<TodoRow>, StoreError> {
        (**self).list().await
    }

    async fn transact(&self, id: &AggregateId, decide: Decide<'_>) -> Result<Transition, StoreError> {
        (**self).transact(id, decide).await
    }
}

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<AggregateId, TodoRow>,
    tombstones: HashSet<AggregateId>,
}

/// In-memory todo store for tests/dev.
///
/// The whole read-decide-write runs under the write lock; `decide` is pure
/// and never awaits, so the critical section stays short.
#[derive(Debug, Default)]
pub struct InMemoryTodoStore {
    inner: RwLock<Inner>,
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tombstone exists for `id`.
    pub fn is_tombstoned(&self, id: &AggregateId) -> bool {
        self.inner
            .read()
            .map(|inner| inner.tombstones.contains(id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl TodoStore for InMemoryTodoStore {
    async fn get(&self, id: &AggregateId) -> Result<Option<TodoRow>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.rows.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<TodoRow>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.rows.values().cloned().collect())
    }

    async fn transact(&self, id: &AggregateId, decide: Decide<'_>) -> Result<Transition, StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;

        let state = match inner.rows.get(id) {
            Some(row) => RowState::Active(row.clone()),
            None if inner.tombstones.contains(id) => RowState::Deleted,
            None => RowState::Absent,
        };

        let transition = decide(&state);
        match &transition {
            Transition::Insert(row) | Transition::Update(row) => {
                inner.rows.insert(id.clone(), row.clone());
            }
            Transition::Delete => {
                inner.rows.remove(id);
                inner.tombstones.insert(id.clone());
            }
            Transition::Ignore(_) => {}
        }

        Ok(transition)
    }
}
