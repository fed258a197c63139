use serde::{Deserialize, Serialize};

use todoflow_core::{AggregateId, DomainError, DomainResult};
use todoflow_events::Command;

use crate::event::{TodoCompleted, TodoCreated, TodoDeleted, TodoEvent, TodoRenamed, TodoReopened};

/// Commands accepted by the todo write path. Each maps to exactly one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoCommand {
    Create {
        id: AggregateId,
        title: String,
        description: String,
    },
    Rename {
        id: AggregateId,
        new_title: String,
    },
    SetDone {
        id: AggregateId,
        done: bool,
    },
    Delete {
        id: AggregateId,
    },
}

impl Command for TodoCommand {
    fn target_aggregate_id(&self) -> &AggregateId {
        match self {
            TodoCommand::Create { id, .. }
            | TodoCommand::Rename { id, .. }
            | TodoCommand::SetDone { id, .. }
            | TodoCommand::Delete { id } => id,
        }
    }
}

impl TodoCommand {
    /// Create command for a brand-new aggregate (fresh id).
    pub fn create(title: impl Into<String>, description: Option<String>) -> Self {
        TodoCommand::Create {
            id: AggregateId::new(),
            title: title.into(),
            description: description.unwrap_or_default(),
        }
    }

    pub fn rename(id: &str, new_title: impl Into<String>) -> DomainResult<Self> {
        Ok(TodoCommand::Rename {
            id: parse_id(id)?,
            new_title: new_title.into(),
        })
    }

    pub fn set_done(id: &str, done: bool) -> DomainResult<Self> {
        Ok(TodoCommand::SetDone {
            id: parse_id(id)?,
            done,
        })
    }

    pub fn delete(id: &str) -> DomainResult<Self> {
        Ok(TodoCommand::Delete { id: parse_id(id)? })
    }

    /// Decide which event this command produces (pure, no IO).
    pub fn decide(&self) -> DomainResult<TodoEvent> {
        match self {
            TodoCommand::Create {
                id,
                title,
                description,
            } => {
                if title.trim().is_empty() {
                    return Err(DomainError::validation("title is required"));
                }
                Ok(TodoEvent::Created(TodoCreated {
                    id: id.clone(),
                    title: title.clone(),
                    description: description.clone(),
                    done: false,
                }))
            }
            TodoCommand::Rename { id, new_title } => {
                if new_title.trim().is_empty() {
                    return Err(DomainError::validation("new title cannot be empty"));
                }
                Ok(TodoEvent::Renamed(TodoRenamed {
                    id: id.clone(),
                    new_title: new_title.clone(),
                }))
            }
            TodoCommand::SetDone { id, done: true } => {
                Ok(TodoEvent::Completed(TodoCompleted { id: id.clone() }))
            }
            TodoCommand::SetDone { id, done: false } => {
                Ok(TodoEvent::Reopened(TodoReopened { id: id.clone() }))
            }
            TodoCommand::Delete { id } => Ok(TodoEvent::Deleted(TodoDeleted { id: id.clone() })),
        }
    }
}

fn parse_id(id: &str) -> DomainResult<AggregateId> {
    id.parse()
        .map_err(|_| DomainError::validation("todo id is required"))
}
