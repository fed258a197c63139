//! Inbound event router (webhook receiver side).
//!
//! Every delivery goes through the same pipeline:
//!
//! ```text
//! delivery (envelope + presented secret)
//!   ↓
//! 1. Authenticate: constant-time comparison against the shared secret
//!   ↓
//! 2. Validate: resolve the event type in the schema registry, decode the payload
//!   ↓
//! 3. Dispatch: hand the typed event to the projector
//!   ↓
//! Ack (also for no-op transitions)
//! ```
//!
//! A rejected delivery never reaches the projector. A storage failure is
//! surfaced as [`RouterError::Database`] so the platform sees a failed delivery
//! and redelivers; projection is idempotent, so redelivery is safe.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use todoflow_core::AggregateId;
use todoflow_events::EventEnvelope;
use todoflow_todos::{SchemaError, SchemaRegistry};

use crate::projections::{ProjectionError, ProjectionOutcome, TodoProjector};
use crate::read_model::{StoreError, TodoStore};

/// Shared secret the platform presents on every delivery.
#[derive(Clone)]
pub struct WebhookSecret(Arc<str>);

impl WebhookSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Arc::from(secret.into()))
    }

    /// Constant-time comparison. Lengths are compared first; the secret length
    /// is not treated as confidential.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();

        if expected.len() != presented.len() {
            return false;
        }

        expected.ct_eq(presented).into()
    }
}

impl core::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("WebhookSecret([REDACTED])")
    }
}

/// Acknowledgment of a processed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub event_type: String,
    pub aggregate_id: AggregateId,
    /// `inserted` / `updated` / `deleted` / `ignored`.
    pub outcome: &'static str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Missing or wrong secret.
    #[error("unauthorized delivery")]
    Auth,

    /// Unknown event type, wrong flow, or payload not matching the registered shape.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Read model unavailable or failed mid-transaction. Redelivery is expected.
    #[error(transparent)]
    Database(#[from] StoreError),
}

impl From<ProjectionError> for RouterError {
    fn from(value: ProjectionError) -> Self {
        match value {
            ProjectionError::Store(e) => RouterError::Database(e),
        }
    }
}

#[derive(Debug)]
pub struct EventRouter<S>
where
    S: TodoStore,
{
    registry: Arc<SchemaRegistry>,
    secret: WebhookSecret,
    projector: TodoProjector<S>,
}

impl<S> EventRouter<S>
where
    S: TodoStore,
{
    pub fn new(registry: Arc<SchemaRegistry>, secret: WebhookSecret, projector: TodoProjector<S>) -> Self {
        Self {
            registry,
            secret,
            projector,
        }
    }

    pub fn projector(&self) -> &TodoProjector<S> {
        &self.projector
    }

    /// Check the presented secret without touching the payload.
    pub fn authenticate(&self, presented_secret: Option<&str>) -> Result<(), RouterError> {
        if presented_secret.is_some_and(|s| self.secret.matches(s)) {
            return Ok(());
        }

        warn!(
            security = true,
            secret_present = presented_secret.is_some(),
            "rejected webhook delivery: bad secret"
        );
        Err(RouterError::Auth)
    }

    /// Authenticate, validate and project one delivery.
    ///
    /// `presented_secret` is `None` when the delivery carried no secret header.
    #[instrument(
        skip(self, envelope, presented_secret),
        fields(event_type = %envelope.event_type, event_id = envelope.event_id.as_deref().unwrap_or("")),
        err(level = "debug")
    )]
    pub async fn handle(
        &self,
        envelope: EventEnvelope,
        presented_secret: Option<&str>,
    ) -> Result<Ack, RouterError> {
        self.authenticate(presented_secret)?;

        let event = self
            .registry
            .validate_envelope(&envelope)
            .inspect_err(|e| debug!(error = %e, "rejected webhook delivery: schema"))?;

        let outcome = self
            .projector
            .apply(&event, envelope.sequence)
            .await
            .inspect_err(|e| error!(error = %e, aggregate_id = %event.id(), "projection failed"))?;

        Ok(Ack {
            event_type: envelope.event_type,
            aggregate_id: event.id().clone(),
            outcome: outcome_label(&outcome),
        })
    }
}

fn outcome_label(outcome: &ProjectionOutcome) -> &'static str {
    match outcome {
        ProjectionOutcome::Inserted => "inserted",
        ProjectionOutcome::Updated => "updated",
        ProjectionOutcome::Deleted => "deleted",
        ProjectionOutcome::Ignored(_) => "ignored",
    }
}
