use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use todoflow_core::AggregateId;
use todoflow_infra::read_model::TodoStore;

use crate::app::services::{AppServices, Settled};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_todos).post(create_todo))
        .route("/:id", get(get_todo).put(update_todo).delete(delete_todo))
}

pub async fn list_todos(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store.list().await {
        Ok(rows) => Json(rows.iter().map(dto::todo_to_json).collect::<Vec<_>>()).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(id) = id.parse::<AggregateId>() else {
        return errors::not_found("todo");
    };

    match services.store.get(&id).await {
        Ok(Some(row)) => Json(dto::todo_to_json(&row)).into_response(),
        Ok(None) => errors::not_found("todo"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Publishes Created and answers immediately; the row appears once the event
/// has been delivered and projected.
pub async fn create_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateTodoRequest>,
) -> axum::response::Response {
    let input = match body.validate() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let description = input.description.clone().unwrap_or_default();

    let handle = match services.gate.create(input.title.clone(), input.description).await {
        Ok(h) => h,
        Err(e) => return errors::command_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "id": handle.aggregate_id.as_str(),
            "title": input.title,
            "description": description,
            "done": false,
        })),
    )
        .into_response()
}

/// Publishes Renamed and/or Completed/Reopened, then waits (bounded) for the
/// read model to reflect the request.
pub async fn update_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateTodoRequest>,
) -> axum::response::Response {
    let update = match body.validate() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut handles = Vec::new();
    if let Some(title) = &update.title {
        match services.gate.rename(&id, title.clone()).await {
            Ok(h) => handles.push(h),
            Err(e) => return errors::command_error_to_response(e),
        }
    }
    if let Some(done) = update.done {
        match services.gate.set_done(&id, done).await {
            Ok(h) => handles.push(h),
            Err(e) => return errors::command_error_to_response(e),
        }
    }

    let Ok(agg) = id.parse::<AggregateId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "todo id is required");
    };

    if update.is_empty() {
        return match services.store.get(&agg).await {
            Ok(Some(row)) => Json(dto::todo_to_json(&row)).into_response(),
            Ok(None) => errors::not_found("todo"),
            Err(e) => errors::store_error_to_response(e),
        };
    }

    match services
        .wait_for(&agg, |row| row.is_some_and(|r| update.satisfied_by(r)))
        .await
    {
        Ok(Settled::Reached(Some(row))) => Json(dto::todo_to_json(&row)).into_response(),
        Ok(_) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "id": agg.as_str(),
                "pending": true,
                "events": handles,
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.gate.delete(&id).await {
        Ok(_) => Json(json!({ "success": true })).into_response(),
        Err(e) => errors::command_error_to_response(e),
    }
}
