//! Service wiring: the explicit context every handler receives.
//!
//! Built once at startup from [`ServiceConfig`]:
//! - Postgres read model when `DATABASE_URL` (or `POSTGRES_URL`) is set, in-memory otherwise
//! - HTTP publisher when platform credentials are set, otherwise a loopback
//!   publisher plus a delivery worker that feeds the router in-process

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use todoflow_core::AggregateId;
use todoflow_events::{EventPublisher, LoopbackPublisher};
use todoflow_infra::config::ServiceConfig;
use todoflow_infra::projections::TodoProjector;
use todoflow_infra::publisher::HttpPublisher;
use todoflow_infra::read_model::{InMemoryTodoStore, PostgresTodoStore, StoreError, TodoRow, TodoStore};
use todoflow_infra::workers::{DeliveryWorker, RedeliveryPolicy, WorkerHandle};
use todoflow_infra::{CommandGate, EventRouter, WebhookSecret};
use todoflow_todos::SchemaRegistry;

pub type SharedStore = Arc<dyn TodoStore>;
pub type SharedPublisher = Arc<dyn EventPublisher>;

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(200);

/// Result of a bounded read-after-write wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// The predicate held; carries the row as last read (`None` if absent).
    Reached(Option<TodoRow>),
    /// The wait bound elapsed first.
    Pending,
}

pub struct AppServices {
    pub gate: CommandGate<SharedPublisher>,
    pub router: Arc<EventRouter<SharedStore>>,
    pub store: SharedStore,
    /// Upper bound on read-after-write waits.
    pub read_wait: Duration,
    // Keeps the loopback delivery worker alive for the lifetime of the services.
    delivery: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    /// Assemble services from already-built adapters.
    pub fn new(
        store: SharedStore,
        publisher: SharedPublisher,
        secret: &str,
        publish_timeout: Duration,
        read_wait: Duration,
    ) -> Self {
        let router = Arc::new(EventRouter::new(
            Arc::new(SchemaRegistry::todo_items()),
            WebhookSecret::new(secret),
            TodoProjector::new(store.clone()),
        ));

        Self {
            gate: CommandGate::new(publisher, publish_timeout),
            router,
            store,
            read_wait,
            delivery: Mutex::new(None),
        }
    }

    /// In-memory store + loopback publisher, delivered back through the router.
    pub fn in_process(config: &ServiceConfig) -> Self {
        Self::with_loopback(Arc::new(InMemoryTodoStore::new()), config)
    }

    fn with_loopback(store: SharedStore, config: &ServiceConfig) -> Self {
        let loopback = Arc::new(LoopbackPublisher::new());
        let events = loopback.subscribe();

        let services = Self::new(
            store,
            loopback,
            &config.transformer_secret,
            config.publish_timeout,
            config.read_wait,
        );

        let worker = DeliveryWorker::spawn(
            "loopback-delivery",
            events,
            services.router.clone(),
            config.transformer_secret.clone(),
            RedeliveryPolicy::default(),
        );
        if let Ok(mut slot) = services.delivery.lock() {
            *slot = Some(worker);
        }
        services
    }

    /// Stop background workers (if any).
    pub async fn shutdown(&self) {
        let worker = self.delivery.lock().ok().and_then(|mut slot| slot.take());
        if let Some(worker) = worker {
            worker.shutdown().await;
        }
    }

    /// Poll the read model until `pred` holds for the row (or its absence).
    ///
    /// Exponential backoff from 10 ms, capped at 200 ms per sleep, bounded by
    /// `read_wait` overall.
    pub async fn wait_for(
        &self,
        id: &AggregateId,
        pred: impl Fn(Option<&TodoRow>) -> bool,
    ) -> Result<Settled, StoreError> {
        let deadline = tokio::time::Instant::now() + self.read_wait;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let row = self.store.get(id).await?;
            if pred(row.as_ref()) {
                return Ok(Settled::Reached(row));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(Settled::Pending);
            }
            tokio::time::sleep(backoff.min(deadline - now)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

/// Build services from configuration.
pub async fn build_services(config: &ServiceConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match &config.database_url {
        Some(url) => {
            let pg = PostgresTodoStore::connect(url, config.store_timeout)
                .await
                .context("connecting to read model database")?;
            pg.ensure_schema().await.context("creating read model schema")?;
            info!("using postgres read model");
            Arc::new(pg)
        }
        None => {
            info!("using in-memory read model");
            Arc::new(InMemoryTodoStore::new())
        }
    };

    let services = match &config.flowcore {
        Some(flowcore) => {
            let publisher = HttpPublisher::new(flowcore.publisher_config(config.publish_timeout))
                .context("building event platform client")?;
            info!(tenant = %flowcore.tenant, data_core = %flowcore.data_core, "publishing to event platform");
            AppServices::new(
                store,
                Arc::new(publisher),
                &config.transformer_secret,
                config.publish_timeout,
                config.read_wait,
            )
        }
        None => {
            info!("publishing through in-process loopback");
            AppServices::with_loopback(store, config)
        }
    };

    Ok(services)
}
