use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use todoflow_infra::read_model::StoreError;
use todoflow_infra::{CommandError, RouterError};
use todoflow_todos::SchemaError;

pub fn command_error_to_response(err: CommandError) -> axum::response::Response {
    match err {
        CommandError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        CommandError::Publish(e) => json_error(StatusCode::BAD_GATEWAY, "publish_error", e.to_string()),
    }
}

pub fn router_error_to_response(err: RouterError) -> axum::response::Response {
    match err {
        RouterError::Auth => json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid secret"),
        RouterError::Schema(e) => schema_error_to_response(e),
        RouterError::Database(e) => store_error_to_response(e),
    }
}

pub fn schema_error_to_response(err: SchemaError) -> axum::response::Response {
    let code = match &err {
        SchemaError::UnknownEventType(_) => "unknown_event_type",
        SchemaError::FlowMismatch { .. } => "flow_mismatch",
        SchemaError::InvalidPayload { .. } => "invalid_payload",
        SchemaError::DuplicateRegistration(_) => "schema_error",
    };
    json_error(StatusCode::BAD_REQUEST, code, err.to_string())
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "database_error", err.to_string())
}

pub fn not_found(what: &str) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
