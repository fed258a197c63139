//! Inbound webhook: the event platform delivers published events here.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

use todoflow_events::EventEnvelope;

use crate::app::errors;
use crate::app::services::AppServices;

pub const SECRET_HEADER: &str = "x-secret";

pub async fn receive_event(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let secret = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());

    // Authenticate before parsing so a bad secret is reported as such even
    // when the body is garbage.
    if let Err(e) = services.router.authenticate(secret) {
        return errors::router_error_to_response(e);
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(env) => env,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_envelope", e.to_string()),
    };

    match services.router.handle(envelope, secret).await {
        Ok(ack) => {
            debug!(
                event_type = %ack.event_type,
                aggregate_id = %ack.aggregate_id,
                outcome = ack.outcome,
                "delivery acknowledged"
            );
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => errors::router_error_to_response(e),
    }
}
