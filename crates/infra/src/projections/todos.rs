use thiserror::Error;
use tracing::{debug, instrument};

use todoflow_todos::TodoEvent;

use crate::read_model::{IgnoreReason, RowState, StoreError, TodoRow, TodoStore, Transition};

/// Result of applying one event to the read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionOutcome {
    Inserted,
    Updated,
    Deleted,
    /// Nothing written. Expected under duplicate or out-of-order delivery; not an error.
    Ignored(IgnoreReason),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Todo projector.
///
/// Applies typed todo events to the read model, one store transaction per
/// event. Holds no aggregate state of its own: every transition re-reads the
/// row inside the transaction, so any number of projector instances can share
/// one store.
#[derive(Debug)]
pub struct TodoProjector<S>
where
    S: TodoStore,
{
    store: S,
}

impl<S> TodoProjector<S>
where
    S: TodoStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply one event.
    ///
    /// - Idempotent for at-least-once delivery
    /// - Events for unknown or deleted ids are silent no-ops
    /// - `sequence`, when present, drops updates older than what the row reflects
    /// - Storage failures are returned, never swallowed, so the caller can fail
    ///   the delivery and let the platform redeliver
    #[instrument(
        skip(self, event),
        fields(aggregate_id = %event.id(), event_type = %event.kind())
    )]
    pub async fn apply(
        &self,
        event: &TodoEvent,
        sequence: Option<u64>,
    ) -> Result<ProjectionOutcome, ProjectionError> {
        let decide = |state: &RowState| decide(state, event, sequence);

        let transition = self.store.transact(event.id(), &decide).await?;

        let outcome = match transition {
            Transition::Insert(_) => ProjectionOutcome::Inserted,
            Transition::Update(_) => ProjectionOutcome::Updated,
            Transition::Delete => ProjectionOutcome::Deleted,
            Transition::Ignore(reason) => {
                debug!(%reason, "event ignored by projection");
                ProjectionOutcome::Ignored(reason)
            }
        };

        Ok(outcome)
    }
}

/// Per-aggregate state machine (pure).
///
/// | Event      | Absent  | Active                                  | Deleted |
/// |------------|---------|-----------------------------------------|---------|
/// | Created    | insert  | ignore (first Created wins)             | ignore  |
/// | Renamed    | ignore  | update title                            | ignore  |
/// | Completed  | ignore  | done = true                             | ignore  |
/// | Reopened   | ignore  | done = false                            | ignore  |
/// | Deleted    | ignore  | delete + tombstone                      | ignore  |
///
/// Deleted is terminal and is applied regardless of sequence.
pub fn decide(state: &RowState, event: &TodoEvent, sequence: Option<u64>) -> Transition {
    let row = match state {
        RowState::Deleted => return Transition::Ignore(IgnoreReason::Tombstoned),
        RowState::Absent => {
            return match event {
                TodoEvent::Created(e) => Transition::Insert(TodoRow {
                    id: e.id.clone(),
                    title: e.title.clone(),
                    description: e.description.clone(),
                    done: false,
                    last_sequence: sequence,
                }),
                _ => Transition::Ignore(IgnoreReason::UnknownAggregate),
            };
        }
        RowState::Active(row) => row,
    };

    match event {
        TodoEvent::Created(e) => {
            if row.title == e.title && row.description == e.description {
                Transition::Ignore(IgnoreReason::DuplicateCreate)
            } else {
                Transition::Ignore(IgnoreReason::ConflictingCreate)
            }
        }
        TodoEvent::Deleted(_) => Transition::Delete,
        TodoEvent::Renamed(e) => update(row, sequence, |r| r.title = e.new_title.clone()),
        TodoEvent::Completed(_) => update(row, sequence, |r| r.done = true),
        TodoEvent::Reopened(_) => update(row, sequence, |r| r.done = false),
    }
}

fn update(row: &TodoRow, sequence: Option<u64>, mutate: impl FnOnce(&mut TodoRow)) -> Transition {
    if let (Some(last), Some(found)) = (row.last_sequence, sequence) {
        if found <= last {
            return Transition::Ignore(IgnoreReason::Stale { last, found });
        }
    }

    let mut next = row.clone();
    mutate(&mut next);
    if sequence.is_some() {
        next.last_sequence = sequence;
    }

    if next == *row {
        Transition::Ignore(IgnoreReason::Unchanged)
    } else {
        Transition::Update(next)
    }
}
