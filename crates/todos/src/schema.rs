//! Event schema registry.
//!
//! Maps `(flow, event type)` to the payload shape that event type must have.
//! The set of shapes is a closed enum ([`TodoEventType`]); registering an
//! event type binds its wire name to the typed decoder for that variant, so
//! adding an event type is an exhaustively-checked change.
//!
//! Registration happens once at startup. After that the registry is only
//! read (it is shared behind an `Arc` without any interior mutability).

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use todoflow_events::EventEnvelope;

use crate::event::{
    TODO_FLOW, TodoCompleted, TodoCreated, TodoDeleted, TodoEvent, TodoRenamed, TodoReopened,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("flow mismatch for {event_type}: expected {expected}, found {found}")]
    FlowMismatch {
        event_type: String,
        expected: String,
        found: String,
    },

    #[error("invalid payload for {event_type}: {reason}")]
    InvalidPayload { event_type: String, reason: String },

    #[error("event type registered twice: {0}")]
    DuplicateRegistration(String),
}

/// Payload shape descriptor: one variant per registered todo event type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TodoEventType {
    Created,
    Renamed,
    Completed,
    Reopened,
    Deleted,
}

impl TodoEventType {
    pub const ALL: [TodoEventType; 5] = [
        TodoEventType::Created,
        TodoEventType::Renamed,
        TodoEventType::Completed,
        TodoEventType::Reopened,
        TodoEventType::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TodoEventType::Created => "todo-item.created.v0",
            TodoEventType::Renamed => "todo-item.renamed.v0",
            TodoEventType::Completed => "todo-item.completed.v0",
            TodoEventType::Reopened => "todo-item.reopened.v0",
            TodoEventType::Deleted => "todo-item.deleted.v0",
        }
    }

    /// Decode a raw payload into the typed variant for this shape.
    ///
    /// Unknown fields, missing fields, blank ids and empty titles are all
    /// rejected here, at the boundary.
    pub fn decode(self, payload: JsonValue) -> Result<TodoEvent, SchemaError> {
        let event = match self {
            TodoEventType::Created => {
                let e: TodoCreated = self.decode_shape(payload)?;
                if e.title.trim().is_empty() {
                    return Err(self.invalid("title cannot be empty"));
                }
                if e.done {
                    return Err(self.invalid("todos are created open (done must be false)"));
                }
                TodoEvent::Created(e)
            }
            TodoEventType::Renamed => {
                let e: TodoRenamed = self.decode_shape(payload)?;
                if e.new_title.trim().is_empty() {
                    return Err(self.invalid("newTitle cannot be empty"));
                }
                TodoEvent::Renamed(e)
            }
            TodoEventType::Completed => TodoEvent::Completed(self.decode_shape(payload)?),
            TodoEventType::Reopened => TodoEvent::Reopened(self.decode_shape(payload)?),
            TodoEventType::Deleted => TodoEvent::Deleted(self.decode_shape(payload)?),
        };
        Ok(event)
    }

    fn decode_shape<T: DeserializeOwned>(self, payload: JsonValue) -> Result<T, SchemaError> {
        serde_json::from_value(payload).map_err(|e| self.invalid(e.to_string()))
    }

    fn invalid(self, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidPayload {
            event_type: self.as_str().to_string(),
            reason: reason.into(),
        }
    }
}

impl core::fmt::Display for TodoEventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registry entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Registration {
    pub flow: &'static str,
    pub shape: TodoEventType,
}

/// Registry of accepted `(flow, event type)` pairs.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: HashMap<&'static str, Registration>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every todo event type registered under [`TODO_FLOW`].
    pub fn todo_items() -> Self {
        let mut registry = Self::new();
        for shape in TodoEventType::ALL {
            // Each variant has a distinct wire name, so this cannot collide.
            let _ = registry.register(TODO_FLOW, shape);
        }
        registry
    }

    pub fn register(
        &mut self,
        flow: &'static str,
        shape: TodoEventType,
    ) -> Result<&mut Self, SchemaError> {
        let event_type = shape.as_str();
        if self.entries.contains_key(event_type) {
            return Err(SchemaError::DuplicateRegistration(event_type.to_string()));
        }
        self.entries.insert(event_type, Registration { flow, shape });
        Ok(self)
    }

    pub fn resolve(&self, event_type: &str) -> Result<Registration, SchemaError> {
        self.entries
            .get(event_type)
            .copied()
            .ok_or_else(|| SchemaError::UnknownEventType(event_type.to_string()))
    }

    /// Validate a payload against the shape registered for `event_type`.
    pub fn validate(&self, event_type: &str, payload: JsonValue) -> Result<TodoEvent, SchemaError> {
        let registration = self.resolve(event_type)?;
        registration.shape.decode(payload)
    }

    /// Validate an inbound envelope, including its flow when the platform sent one.
    pub fn validate_envelope(&self, envelope: &EventEnvelope) -> Result<TodoEvent, SchemaError> {
        let registration = self.resolve(&envelope.event_type)?;

        if let Some(found) = envelope.flow_type.as_deref() {
            if found != registration.flow {
                return Err(SchemaError::FlowMismatch {
                    event_type: envelope.event_type.clone(),
                    expected: registration.flow.to_string(),
                    found: found.to_string(),
                });
            }
        }

        registration.shape.decode(envelope.payload.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
