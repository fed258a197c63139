use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use todoflow_core::AggregateId;
use todoflow_events::Event;

use crate::schema::TodoEventType;

/// Flow every todo event belongs to.
pub const TODO_FLOW: &str = "todo-items";

/// Event: TodoCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TodoCreated {
    pub id: AggregateId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Always `false`; carried on the wire for compatibility with existing producers.
    #[serde(default)]
    pub done: bool,
}

/// Event: TodoRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TodoRenamed {
    pub id: AggregateId,
    pub new_title: String,
}

/// Event: TodoCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TodoCompleted {
    pub id: AggregateId,
}

/// Event: TodoReopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TodoReopened {
    pub id: AggregateId,
}

/// Event: TodoDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TodoDeleted {
    pub id: AggregateId,
}

/// Closed set of todo domain events.
///
/// The wire payload is the inner struct only; the variant is carried out of
/// band as the event type string (see [`TodoEventType`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoEvent {
    Created(TodoCreated),
    Renamed(TodoRenamed),
    Completed(TodoCompleted),
    Reopened(TodoReopened),
    Deleted(TodoDeleted),
}

impl TodoEvent {
    pub fn kind(&self) -> TodoEventType {
        match self {
            TodoEvent::Created(_) => TodoEventType::Created,
            TodoEvent::Renamed(_) => TodoEventType::Renamed,
            TodoEvent::Completed(_) => TodoEventType::Completed,
            TodoEvent::Reopened(_) => TodoEventType::Reopened,
            TodoEvent::Deleted(_) => TodoEventType::Deleted,
        }
    }

    pub fn id(&self) -> &AggregateId {
        match self {
            TodoEvent::Created(e) => &e.id,
            TodoEvent::Renamed(e) => &e.id,
            TodoEvent::Completed(e) => &e.id,
            TodoEvent::Reopened(e) => &e.id,
            TodoEvent::Deleted(e) => &e.id,
        }
    }
}

impl Event for TodoEvent {
    fn flow(&self) -> &'static str {
        TODO_FLOW
    }

    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    fn aggregate_id(&self) -> &AggregateId {
        self.id()
    }

    fn to_payload(&self) -> Result<JsonValue, serde_json::Error> {
        match self {
            TodoEvent::Created(e) => serde_json::to_value(e),
            TodoEvent::Renamed(e) => serde_json::to_value(e),
            TodoEvent::Completed(e) => serde_json::to_value(e),
            TodoEvent::Reopened(e) => serde_json::to_value(e),
            TodoEvent::Deleted(e) => serde_json::to_value(e),
        }
    }
}
