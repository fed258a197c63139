//! Outbound event publishing (opaque publish/ack boundary).
//!
//! The publisher is the **transport** between the command side and the
//! platform that eventually delivers events back to the webhook router.
//!
//! ## Delivery Guarantees
//!
//! An acknowledgment only means the platform accepted the event. It says
//! nothing about when (or in which order relative to other events) the event
//! reaches the router:
//! - Events may be delivered multiple times (at-least-once)
//! - Events may be delivered out of order
//! - Consumers must be idempotent
//!
//! ## Error Handling
//!
//! `publish()` can fail (platform rejected the call, network error, timeout).
//! Failures are surfaced to the caller and are retryable from the caller's
//! point of view; nothing in this crate retries internally.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Acknowledgment returned by the platform for an accepted publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishAck {
    /// Platform-assigned event id, when the platform reports one.
    pub event_id: Option<String>,
}

impl PublishAck {
    pub fn new(event_id: Option<String>) -> Self {
        Self { event_id }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The platform answered but refused the event.
    #[error("publisher rejected event: {0}")]
    Rejected(String),

    /// The platform could not be reached.
    #[error("publisher unavailable: {0}")]
    Unavailable(String),

    /// The publish round-trip exceeded its bound. Treated as failure, never success.
    #[error("publish timed out after {0} ms")]
    Timeout(u64),

    /// The event payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// Outbound publish boundary.
///
/// The trait requires `Send + Sync`: the command side shares one publisher
/// across all request handlers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        flow: &str,
        event_type: &str,
        payload: JsonValue,
    ) -> Result<PublishAck, PublishError>;
}

#[async_trait]
impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    async fn publish(
        &self,
        flow: &str,
        event_type: &str,
        payload: JsonValue,
    ) -> Result<PublishAck, PublishError> {
        (**self).publish(flow, event_type, payload).await
    }
}
