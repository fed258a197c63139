//! Infrastructure layer: read model storage, projection, routing, publishing, config.

pub mod command_gate;
pub mod config;
pub mod event_router;
pub mod projections;
pub mod publisher;
pub mod read_model;
pub mod workers;

pub use command_gate::{CommandError, CommandGate, EventHandle};
pub use event_router::{Ack, EventRouter, RouterError, WebhookSecret};
