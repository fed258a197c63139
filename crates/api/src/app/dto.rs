use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use todoflow_infra::read_model::TodoRow;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Fields are kept as raw JSON so a wrongly-typed value becomes a validation
/// error with a JSON body instead of an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub title: JsonValue,
    #[serde(default)]
    pub description: JsonValue,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub title: JsonValue,
    #[serde(default)]
    pub done: JsonValue,
}

/// Validated create input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTodo {
    pub title: String,
    pub description: Option<String>,
}

/// Validated update input. `title` is only set for a non-empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub done: Option<bool>,
}

impl UpdateTodo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.done.is_none()
    }

    /// Whether `row` reflects every requested change.
    pub fn satisfied_by(&self, row: &TodoRow) -> bool {
        self.title.as_ref().is_none_or(|t| &row.title == t) && self.done.is_none_or(|d| row.done == d)
    }
}

impl CreateTodoRequest {
    pub fn validate(self) -> Result<CreateTodo, axum::response::Response> {
        let title = match self.title {
            JsonValue::String(s) if !s.trim().is_empty() => s,
            _ => return Err(validation("title is required and must be a string")),
        };
        let description = match self.description {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s),
            _ => return Err(validation("description must be a string")),
        };
        Ok(CreateTodo { title, description })
    }
}

impl UpdateTodoRequest {
    pub fn validate(self) -> Result<UpdateTodo, axum::response::Response> {
        let title = match self.title {
            JsonValue::Null => None,
            JsonValue::String(s) if s.is_empty() => None,
            JsonValue::String(s) => Some(s),
            _ => return Err(validation("title must be a string")),
        };
        let done = match self.done {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(b),
            _ => return Err(validation("done must be a boolean")),
        };
        Ok(UpdateTodo { title, done })
    }
}

fn validation(msg: &str) -> axum::response::Response {
    errors::json_error(axum::http::StatusCode::BAD_REQUEST, "validation_error", msg)
}

// -------------------------
// Response mapping
// -------------------------

pub fn todo_to_json(row: &TodoRow) -> JsonValue {
    json!({
        "id": row.id.as_str(),
        "title": row.title,
        "description": row.description,
        "done": row.done,
    })
}
