use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use todoflow_events::PublishedEvent;

use crate::event_router::{EventRouter, RouterError};
use crate::read_model::TodoStore;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(j) = self.join.take() {
            let _ = j.await;
        }
    }
}

/// Redelivery policy for failed deliveries.
#[derive(Debug, Clone, Copy)]
pub struct RedeliveryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

/// Loopback delivery worker.
///
/// Stands in for the external platform in dev and tests:
/// - Receives events from a loopback publisher subscription
/// - Delivers each one to the router, presenting the shared secret
/// - Redelivers on storage failures, with bounded exponential backoff
/// - Drops deliveries the router rejects (auth/schema); retrying cannot fix them
#[derive(Debug)]
pub struct DeliveryWorker;

impl DeliveryWorker {
    pub fn spawn<S>(
        name: &'static str,
        mut events: mpsc::UnboundedReceiver<PublishedEvent>,
        router: Arc<EventRouter<S>>,
        secret: String,
        policy: RedeliveryPolicy,
    ) -> WorkerHandle
    where
        S: TodoStore + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    msg = events.recv() => match msg {
                        Some(ev) => deliver(name, &router, &secret, ev, policy).await,
                        None => break,
                    },
                }
            }
        });

        WorkerHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

async fn deliver<S>(
    name: &'static str,
    router: &EventRouter<S>,
    secret: &str,
    event: PublishedEvent,
    policy: RedeliveryPolicy,
) where
    S: TodoStore,
{
    let mut backoff = policy.initial_backoff;

    for attempt in 1..=policy.max_attempts.max(1) {
        match router.handle(event.envelope.clone(), Some(secret)).await {
            Ok(ack) => {
                debug!(worker = name, outcome = ack.outcome, attempt, "delivery acknowledged");
                return;
            }
            Err(RouterError::Database(err)) if attempt < policy.max_attempts => {
                warn!(worker = name, error = %err, attempt, "delivery failed, redelivering");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(err) => {
                warn!(
                    worker = name,
                    error = %err,
                    event_type = %event.envelope.event_type,
                    attempt,
                    "delivery dropped"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use todoflow_core::AggregateId;
    use todoflow_events::{EventPublisher, LoopbackPublisher};
    use todoflow_todos::SchemaRegistry;

    use crate::event_router::WebhookSecret;
    use crate::projections::TodoProjector;
    use crate::read_model::{Decide, InMemoryTodoStore, StoreError, TodoRow, Transition};

    /// Fails the first `failures` transactions, then delegates.
    struct Flaky {
        inner: InMemoryTodoStore,
        failures: AtomicU32,
    }

    #[async_trait]
    impl TodoStore for Flaky {
        async fn get(&self, id: &AggregateId) -> Result<Option<TodoRow>, StoreError> {
            self.inner.get(id).await
        }

        async fn list(&self) -> Result<Vec<TodoRow>, StoreError> {
            self.inner.list().await
        }

        async fn transact(&self, id: &AggregateId, decide: Decide<'_>) -> Result<Transition, StoreError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::database("transact", "connection reset"));
            }
            self.inner.transact(id, decide).await
        }
    }

    async fn wait_for_rows<S: TodoStore>(store: &S, n: usize) -> Vec<TodoRow> {
        for _ in 0..100 {
            let rows = store.list().await.unwrap();
            if rows.len() == n {
                return rows;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("read model never reached {n} rows");
    }

    #[tokio::test]
    async fn delivers_published_events_to_router() {
        let publisher = LoopbackPublisher::new();
        let store = Arc::new(InMemoryTodoStore::new());
        let router = Arc::new(EventRouter::new(
            Arc::new(SchemaRegistry::todo_items()),
            WebhookSecret::new("s"),
            TodoProjector::new(store.clone()),
        ));

        let worker = DeliveryWorker::spawn(
            "delivery",
            publisher.subscribe(),
            router,
            "s".to_string(),
            RedeliveryPolicy::default(),
        );

        publisher
            .publish(
                "todo-items",
                "todo-item.created.v0",
                serde_json::json!({ "id": "t-1", "title": "a" }),
            )
            .await
            .unwrap();

        let rows = wait_for_rows(&store, 1).await;
        assert_eq!(rows[0].title, "a");
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn storage_failures_are_redelivered() {
        let publisher = LoopbackPublisher::new();
        let store = Arc::new(Flaky {
            inner: InMemoryTodoStore::new(),
            failures: AtomicU32::new(2),
        });
        let router = Arc::new(EventRouter::new(
            Arc::new(SchemaRegistry::todo_items()),
            WebhookSecret::new("s"),
            TodoProjector::new(store.clone()),
        ));

        let worker = DeliveryWorker::spawn(
            "delivery",
            publisher.subscribe(),
            router,
            "s".to_string(),
            RedeliveryPolicy::default(),
        );

        publisher
            .publish(
                "todo-items",
                "todo-item.created.v0",
                serde_json::json!({ "id": "t-1", "title": "a" }),
            )
            .await
            .unwrap();

        wait_for_rows(&store, 1).await;
        assert_eq!(store.failures.load(Ordering::SeqCst), 0);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn wrong_secret_deliveries_are_dropped() {
        let publisher = LoopbackPublisher::new();
        let store = Arc::new(InMemoryTodoStore::new());
        let router = Arc::new(EventRouter::new(
            Arc::new(SchemaRegistry::todo_items()),
            WebhookSecret::new("s"),
            TodoProjector::new(store.clone()),
        ));

        let worker = DeliveryWorker::spawn(
            "delivery",
            publisher.subscribe(),
            router,
            "wrong".to_string(),
            RedeliveryPolicy::default(),
        );

        publisher
            .publish(
                "todo-items",
                "todo-item.created.v0",
                serde_json::json!({ "id": "t-1", "title": "a" }),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.list().await.unwrap().is_empty());
        worker.shutdown().await;
    }
}
