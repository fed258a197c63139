//! Command execution pipeline (write side).
//!
//! ## Command Execution Flow
//!
//! ```text
//! Command
//!   ↓
//! 1. Decide (pure validation, produces exactly one event)
//!   ↓
//! 2. Encode payload
//!   ↓
//! 3. Publish to the event platform (bounded by the publish timeout)
//!   ↓
//! EventHandle (aggregate id + event type + platform ack)
//! ```
//!
//! The gate never touches the read model. A successful return only means the
//! platform accepted the event; the projection catches up asynchronously once
//! the platform delivers it to the webhook router.
//!
//! ## Error Semantics
//!
//! - **Validation**: rejected before anything is published
//! - **Publish**: the platform refused, was unreachable or timed out. Nothing
//!   is known to be published, so the caller may retry; a retried Created may
//!   produce a duplicate todo (different id), which is accepted.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use todoflow_core::{AggregateId, DomainError};
use todoflow_events::{Event, EventPublisher, PublishAck, PublishError};
use todoflow_todos::{TodoCommand, TodoEventType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Deterministic input failure. Nothing was published.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Publishing failed. Nothing is known to be published.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl From<DomainError> for CommandError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                CommandError::Validation(msg)
            }
        }
    }
}

/// Handle to the event a command produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandle {
    pub aggregate_id: AggregateId,
    #[serde(serialize_with = "serialize_event_type")]
    pub event_type: TodoEventType,
    pub ack: PublishAck,
}

fn serialize_event_type<S: serde::Serializer>(ty: &TodoEventType, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(ty.as_str())
}

/// Command gate: validates todo commands and publishes one event per command.
///
/// Generic over the publisher so tests run against the loopback publisher and
/// production against the HTTP one.
#[derive(Debug)]
pub struct CommandGate<P> {
    publisher: P,
    publish_timeout: Duration,
}

impl<P> CommandGate<P>
where
    P: EventPublisher,
{
    pub fn new(publisher: P, publish_timeout: Duration) -> Self {
        Self {
            publisher,
            publish_timeout,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Create a todo with a freshly minted id.
    pub async fn create(
        &self,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<EventHandle, CommandError> {
        self.dispatch(TodoCommand::create(title, description)).await
    }

    pub async fn rename(&self, id: &str, new_title: impl Into<String>) -> Result<EventHandle, CommandError> {
        self.dispatch(TodoCommand::rename(id, new_title)?).await
    }

    /// `done = true` publishes Completed, `false` publishes Reopened.
    pub async fn set_done(&self, id: &str, done: bool) -> Result<EventHandle, CommandError> {
        self.dispatch(TodoCommand::set_done(id, done)?).await
    }

    pub async fn delete(&self, id: &str) -> Result<EventHandle, CommandError> {
        self.dispatch(TodoCommand::delete(id)?).await
    }

    /// Decide and publish. Exactly one event per successful call.
    ///
    /// The gate does not check whether the aggregate exists: commands against
    /// unknown or deleted ids still publish and are no-ops at projection time.
    #[instrument(skip(self, command), err)]
    pub async fn dispatch(&self, command: TodoCommand) -> Result<EventHandle, CommandError> {
        let event = command.decide()?;
        let payload = event
            .to_payload()
            .map_err(|e| PublishError::Encode(e.to_string()))?;

        let publish = self.publisher.publish(event.flow(), event.event_type(), payload);
        let ack = match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(res) => res.inspect_err(|e| warn!(error = %e, "event publish failed"))?,
            Err(_) => {
                let ms = self.publish_timeout.as_millis() as u64;
                warn!(timeout_ms = ms, "event publish timed out");
                return Err(PublishError::Timeout(ms).into());
            }
        };

        info!(
            aggregate_id = %event.id(),
            event_type = event.event_type(),
            event_id = ack.event_id.as_deref().unwrap_or(""),
            "event published"
        );

        Ok(EventHandle {
            aggregate_id: event.id().clone(),
            event_type: event.kind(),
            ack,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Value as JsonValue, json};
    use todoflow_events::LoopbackPublisher;

    fn gate() -> CommandGate<Arc<LoopbackPublisher>> {
        CommandGate::new(Arc::new(LoopbackPublisher::with_log()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn create_publishes_exactly_one_created_event() {
        let gate = gate();
        let handle = gate.create("Buy milk", None).await.unwrap();

        assert_eq!(handle.event_type, TodoEventType::Created);
        assert!(handle.ack.event_id.is_some());

        let published = gate.publisher().published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].flow, "todo-items");
        assert_eq!(published[0].envelope.event_type, "todo-item.created.v0");
        assert_eq!(
            published[0].envelope.payload,
            json!({ "id": handle.aggregate_id.as_str(), "title": "Buy milk", "description": "", "done": false })
        );
    }

    #[tokio::test]
    async fn each_command_maps_to_its_event_type() {
        let gate = gate();
        let cases = [
            (gate.rename("t-1", "x").await.unwrap(), "todo-item.renamed.v0"),
            (gate.set_done("t-1", true).await.unwrap(), "todo-item.completed.v0"),
            (gate.set_done("t-1", false).await.unwrap(), "todo-item.reopened.v0"),
            (gate.delete("t-1").await.unwrap(), "todo-item.deleted.v0"),
        ];
        for (handle, ty) in cases {
            assert_eq!(handle.event_type.as_str(), ty);
            assert_eq!(handle.aggregate_id.as_str(), "t-1");
        }
        assert_eq!(gate.publisher().published().len(), 4);
    }

    #[tokio::test]
    async fn validation_failures_publish_nothing() {
        let gate = gate();
        assert!(matches!(gate.create("  ", None).await, Err(CommandError::Validation(_))));
        assert!(matches!(gate.rename("t-1", "").await, Err(CommandError::Validation(_))));
        assert!(matches!(gate.delete("").await, Err(CommandError::Validation(_))));
        assert!(gate.publisher().published().is_empty());
    }

    struct Failing(PublishError);

    #[async_trait]
    impl EventPublisher for Failing {
        async fn publish(&self, _: &str, _: &str, _: JsonValue) -> Result<PublishAck, PublishError> {
            Err(self.0.clone())
        }
    }

    struct Hanging;

    #[async_trait]
    impl EventPublisher for Hanging {
        async fn publish(&self, _: &str, _: &str, _: JsonValue) -> Result<PublishAck, PublishError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn publisher_failure_is_surfaced() {
        let gate = CommandGate::new(
            Failing(PublishError::Unavailable("down".to_string())),
            Duration::from_secs(1),
        );
        let err = gate.delete("t-1").await.unwrap_err();
        assert_eq!(err, CommandError::Publish(PublishError::Unavailable("down".to_string())));
    }

    #[tokio::test]
    async fn publish_timeout_is_a_failure() {
        let gate = CommandGate::new(Hanging, Duration::from_millis(20));
        let err = gate.set_done("t-1", true).await.unwrap_err();
        assert_eq!(err, CommandError::Publish(PublishError::Timeout(20)));
    }
}
