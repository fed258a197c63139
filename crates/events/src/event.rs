use todoflow_core::AggregateId;

/// A domain event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (the version is part of the event type string and is never
///   reused for an incompatible payload shape)
/// - scoped to exactly one aggregate
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Flow (stream family) the event belongs to, e.g. `"todo-items"`.
    fn flow(&self) -> &'static str;

    /// Stable, versioned event type identifier, e.g. `"todo-item.created.v0"`.
    fn event_type(&self) -> &'static str;

    /// The aggregate this event is about.
    fn aggregate_id(&self) -> &AggregateId;

    /// Wire payload for the publisher.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;
}
