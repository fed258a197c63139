//! In-process publisher for tests/dev.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::envelope::EventEnvelope;
use crate::publisher::{EventPublisher, PublishAck, PublishError};

/// A published event as seen by loopback subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub flow: String,
    pub envelope: EventEnvelope,
}

/// Loopback publisher.
///
/// - Acknowledges immediately with a fresh event id
/// - Fans the event out to every live subscriber (a delivery worker typically
///   forwards it to the webhook router, emulating the external platform)
/// - Optionally keeps a log of everything it acknowledged ([`Self::with_log`]);
///   the log is unbounded, so long-running servers use [`Self::new`]
#[derive(Debug, Default)]
pub struct LoopbackPublisher {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PublishedEvent>>>,
    published: Option<Mutex<Vec<PublishedEvent>>>,
}

impl LoopbackPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher that also records every acknowledged event.
    pub fn with_log() -> Self {
        Self {
            published: Some(Mutex::new(Vec::new())),
            ..Self::default()
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PublishedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        // A poisoned lock still hands out a receiver; it just never sees messages.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        rx
    }

    /// Everything acknowledged so far, in publish order. Empty unless built
    /// with [`Self::with_log`].
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.published
            .as_ref()
            .and_then(|log| log.lock().ok().map(|p| p.clone()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for LoopbackPublisher {
    async fn publish(
        &self,
        flow: &str,
        event_type: &str,
        payload: JsonValue,
    ) -> Result<PublishAck, PublishError> {
        let event_id = Uuid::now_v7().to_string();
        let message = PublishedEvent {
            flow: flow.to_string(),
            envelope: EventEnvelope::new(event_type, payload)
                .with_event_id(event_id.clone())
                .with_flow_type(flow),
        };

        {
            let mut subs = self
                .subscribers
                .lock()
                .map_err(|_| PublishError::Unavailable("loopback publisher poisoned".to_string()))?;
            // Drop any dead subscribers while publishing.
            subs.retain(|tx| tx.send(message.clone()).is_ok());
        }

        if let Some(Ok(mut log)) = self.published.as_ref().map(|log| log.lock()) {
            log.push(message);
        }

        Ok(PublishAck::new(Some(event_id)))
    }
}
