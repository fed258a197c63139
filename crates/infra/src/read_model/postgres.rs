//! Postgres-backed todo store implementation.
//!
//! ## Schema
//!
//! - `todo(id TEXT PRIMARY KEY, title, description, done, last_sequence)` is the read model
//! - `todo_tombstone(id TEXT PRIMARY KEY, deleted_at)` records hard deletions so a
//!   redelivered Created can never resurrect a deleted aggregate
//!
//! ## Per-aggregate serialisation
//!
//! `transact` runs one transaction per event:
//! 1. `pg_advisory_xact_lock(hashtext(id))` serialises every transition for the id,
//!    including ids that have no row yet (where `SELECT ... FOR UPDATE` locks nothing)
//! 2. read row + tombstone
//! 3. decide, write, commit
//!
//! Transitions for different ids only share the connection pool. The whole
//! transaction is bounded by the configured timeout; on timeout the transaction
//! is dropped (rolled back) and the call fails.
//!
//! ## Error Mapping
//!
//! Every SQLx error becomes `StoreError::Database` tagged with the operation
//! that failed. Callers treat all of them as transient.

use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use todoflow_core::AggregateId;

use super::todo_store::{Decide, RowState, StoreError, TodoRow, TodoStore, Transition};

const CREATE_TODO_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS todo (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        done BOOLEAN NOT NULL DEFAULT FALSE,
        last_sequence BIGINT NULL
    )
"#;

const CREATE_TOMBSTONE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS todo_tombstone (
        id TEXT PRIMARY KEY,
        deleted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// Postgres-backed todo read model.
///
/// Uses a SQLx connection pool, which is `Send + Sync` and cheap to clone, so
/// the store can be shared by every request handler and replicated across
/// processes.
#[derive(Debug, Clone)]
pub struct PostgresTodoStore {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresTodoStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Connect a pool whose connection acquisition shares the operation timeout.
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, timeout))
    }

    /// Create the read model tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for ddl in [CREATE_TODO_TABLE, CREATE_TOMBSTONE_TABLE] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    async fn transact_inner(
        &self,
        id: &AggregateId,
        decide: Decide<'_>,
    ) -> Result<Transition, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_aggregate", e))?;

        let state = load_state(&mut tx, id).await?;
        let transition = decide(&state);

        match &transition {
            Transition::Insert(row) => {
                sqlx::query(
                    r#"
                    INSERT INTO todo (id, title, description, done, last_sequence)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(row.id.as_str())
                .bind(&row.title)
                .bind(&row.description)
                .bind(row.done)
                .bind(row.last_sequence.map(|s| s as i64))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_todo", e))?;
            }
            Transition::Update(row) => {
                sqlx::query(
                    r#"
                    UPDATE todo
                    SET title = $2, description = $3, done = $4, last_sequence = $5
                    WHERE id = $1
                    "#,
                )
                .bind(row.id.as_str())
                .bind(&row.title)
                .bind(&row.description)
                .bind(row.done)
                .bind(row.last_sequence.map(|s| s as i64))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_todo", e))?;
            }
            Transition::Delete => {
                sqlx::query("DELETE FROM todo WHERE id = $1")
                    .bind(id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("delete_todo", e))?;

                sqlx::query(
                    "INSERT INTO todo_tombstone (id) VALUES ($1) ON CONFLICT (id) DO NOTHING",
                )
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_tombstone", e))?;
            }
            Transition::Ignore(_) => {}
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(transition)
    }
}

#[async_trait::async_trait]
impl TodoStore for PostgresTodoStore {
    #[instrument(skip(self), fields(aggregate_id = %id), err)]
    async fn get(&self, id: &AggregateId) -> Result<Option<TodoRow>, StoreError> {
        self.bounded(async {
            let row = sqlx::query(
                "SELECT id, title, description, done, last_sequence FROM todo WHERE id = $1",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_todo", e))?;

            row.as_ref().map(row_to_todo).transpose()
        })
        .await
    }

    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list(&self) -> Result<Vec<TodoRow>, StoreError> {
        self.bounded(async {
            let rows = sqlx::query(
                "SELECT id, title, description, done, last_sequence FROM todo ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_todos", e))?;

            Span::current().record("row_count", rows.len());
            rows.iter().map(row_to_todo).collect()
        })
        .await
    }

    #[instrument(skip(self, decide), fields(aggregate_id = %id), err)]
    async fn transact(&self, id: &AggregateId, decide: Decide<'_>) -> Result<Transition, StoreError> {
        self.bounded(self.transact_inner(id, decide)).await
    }
}

async fn load_state(
    tx: &mut Transaction<'_, Postgres>,
    id: &AggregateId,
) -> Result<RowState, StoreError> {
    let row = sqlx::query(
        "SELECT id, title, description, done, last_sequence FROM todo WHERE id = $1",
    )
    .bind(id.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_todo", e))?;

    if let Some(row) = row {
        return Ok(RowState::Active(row_to_todo(&row)?));
    }

    let tombstone = sqlx::query("SELECT 1 FROM todo_tombstone WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_tombstone", e))?;

    Ok(if tombstone.is_some() {
        RowState::Deleted
    } else {
        RowState::Absent
    })
}

fn row_to_todo(row: &PgRow) -> Result<TodoRow, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_todo", e);

    let id: String = row.try_get("id").map_err(decode)?;
    let id = id
        .parse::<AggregateId>()
        .map_err(|e| StoreError::database("decode_todo", e.to_string()))?;

    Ok(TodoRow {
        id,
        title: row.try_get("title").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        done: row.try_get("done").map_err(decode)?,
        last_sequence: row
            .try_get::<Option<i64>, _>("last_sequence")
            .map_err(decode)?
            .map(|s| s as u64),
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::database(operation, db_err.message()),
        sqlx::Error::PoolTimedOut => StoreError::database(operation, "connection pool timed out"),
        sqlx::Error::PoolClosed => StoreError::database(operation, "connection pool closed"),
        other => StoreError::database(operation, other.to_string()),
    }
}
