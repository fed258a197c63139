use axum::{routing::post, Router};

pub mod system;
pub mod todos;
pub mod transformer;

/// Router for the todo API and the inbound webhook.
pub fn router() -> Router {
    Router::new()
        .nest("/api/todos", todos::router())
        .route("/api/transformer", post(transformer::receive_event))
        .route("/api/transformer/", post(transformer::receive_event))
}
