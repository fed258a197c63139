//! Event abstractions shared by the command and projection sides.
//!
//! - `Event`: a typed domain fact with a stable (flow, event type) identity
//! - `EventEnvelope`: the router-facing shape of an inbound delivery
//! - `EventPublisher`: opaque outbound publish/ack boundary

pub mod command;
pub mod envelope;
pub mod event;
pub mod in_memory_publisher;
pub mod publisher;

pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_publisher::{LoopbackPublisher, PublishedEvent};
pub use publisher::{EventPublisher, PublishAck, PublishError};
