use todoflow_core::AggregateId;

/// A command targets a specific aggregate (command abstraction).
///
/// Commands represent **intent** - a request to perform an action on an aggregate.
/// They are **transient** (not persisted) and are transformed into events, which are
/// handed to the publisher.
///
/// ## Command vs Event
///
/// - **Command**: Intent to do something (e.g., "Rename todo to 'Buy oat milk'")
/// - **Event**: Fact that something happened (e.g., "Renamed { new_title }")
///
/// Commands are rejected if invalid (validation errors). Events represent accepted changes.
///
/// Commands must be cloneable, `Send + Sync` and `'static` so they can cross task
/// boundaries and be logged or retried by the caller.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> &AggregateId;
}
