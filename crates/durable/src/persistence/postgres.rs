//! PostgreSQL implementation of InstanceStore
//!
//! - Instance rows in `orderflow_instances`
//! - Append-only history in `orderflow_history`, keyed by (instance, sequence)
//! - Appends lock the instance row so concurrent writers see a conflict

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, error, info, instrument};

use super::store::{InstanceStore, StoreError};
use super::{InstanceFilter, InstanceId, InstanceRecord, NewInstance, WorkflowStatus};
use crate::workflow::{HistoryEvent, HistoryRecord, WorkflowError};

/// PostgreSQL implementation of InstanceStore
///
/// # Example
///
/// ```ignore
/// use orderflow_durable::PostgresInstanceStore;
///
/// let store = PostgresInstanceStore::connect("postgres://localhost/orderflow").await?;
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresInstanceStore {
    pool: PgPool,
}

impl PostgresInstanceStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(db_error)?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InstanceStore for PostgresInstanceStore {
    #[instrument(skip(self, instance), fields(instance_id = %instance.instance_id))]
    async fn create_instance(&self, instance: NewInstance) -> Result<(), StoreError> {
        let started = HistoryEvent::WorkflowStarted {
            input: instance.input.clone(),
        };
        let event_data = serde_json::to_value(&started).map_err(ser_error)?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orderflow_instances (instance_id, workflow_type, status, input)
            VALUES ($1, $2, 'pending', $3)
            ON CONFLICT (instance_id) DO NOTHING
            "#,
        )
        .bind(instance.instance_id.as_str())
        .bind(&instance.workflow_type)
        .bind(&instance.input)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create instance: {}", e);
            db_error(e)
        })?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::DuplicateInstance(instance.instance_id));
        }

        sqlx::query(
            r#"
            INSERT INTO orderflow_history (instance_id, sequence, event_type, event_data)
            VALUES ($1, 0, $2, $3)
            "#,
        )
        .bind(instance.instance_id.as_str())
        .bind(started.kind())
        .bind(&event_data)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        debug!(workflow_type = %instance.workflow_type, "created instance");
        Ok(())
    }

    #[instrument(skip(self, event), fields(%instance_id, event = event.kind()))]
    async fn append(
        &self,
        instance_id: &InstanceId,
        expected_sequence: u64,
        event: HistoryEvent,
    ) -> Result<u64, StoreError> {
        let event_data = serde_json::to_value(&event).map_err(ser_error)?;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Row lock serializes appends for this instance only
        sqlx::query("SELECT instance_id FROM orderflow_instances WHERE instance_id = $1 FOR UPDATE")
            .bind(instance_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))?;

        let row = sqlx::query(
            r#"
            SELECT COALESCE(MAX(sequence) + 1, 0) AS next_seq
            FROM orderflow_history
            WHERE instance_id = $1
            "#,
        )
        .bind(instance_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let current = row.get::<i64, _>("next_seq") as u64;
        if current != expected_sequence {
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_sequence,
                actual: current,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO orderflow_history (instance_id, sequence, event_type, event_data)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(instance_id.as_str())
        .bind(current as i64)
        .bind(event.kind())
        .bind(&event_data)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("UPDATE orderflow_instances SET updated_at = NOW() WHERE instance_id = $1")
            .bind(instance_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(current + 1)
    }

    #[instrument(skip(self))]
    async fn read_history(&self, instance_id: &InstanceId) -> Result<Vec<HistoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, event_data, recorded_at
            FROM orderflow_history
            WHERE instance_id = $1
            ORDER BY sequence
            "#,
        )
        .bind(instance_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load history: {}", e);
            db_error(e)
        })?;

        // Every instance has at least its start event
        if rows.is_empty() {
            return Err(StoreError::InstanceNotFound(instance_id.clone()));
        }

        rows.iter()
            .map(|row| {
                let data: serde_json::Value = row.get("event_data");
                Ok(HistoryRecord {
                    sequence: row.get::<i64, _>("sequence") as u64,
                    event: serde_json::from_value(data).map_err(ser_error)?,
                    recorded_at: row.get::<DateTime<Utc>, _>("recorded_at"),
                })
            })
            .collect()
    }

    #[instrument(skip(self, output, error))]
    async fn set_status(
        &self,
        instance_id: &InstanceId,
        status: WorkflowStatus,
        output: Option<serde_json::Value>,
        error: Option<WorkflowError>,
    ) -> Result<(), StoreError> {
        let error_json = error.map(serde_json::to_value).transpose().map_err(ser_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE orderflow_instances
            SET status = $2, output = $3, error = $4, updated_at = NOW()
            WHERE instance_id = $1
            "#,
        )
        .bind(instance_id.as_str())
        .bind(status.as_str())
        .bind(&output)
        .bind(&error_json)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::InstanceNotFound(instance_id.clone()));
        }

        debug!(%status, "updated instance status");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_status(&self, instance_id: &InstanceId) -> Result<WorkflowStatus, StoreError> {
        let row = sqlx::query("SELECT status FROM orderflow_instances WHERE instance_id = $1")
            .bind(instance_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))?;

        parse_status(row.get("status"))
    }

    #[instrument(skip(self))]
    async fn get_instance(&self, instance_id: &InstanceId) -> Result<InstanceRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT instance_id, workflow_type, status, input, output, error, created_at, updated_at
            FROM orderflow_instances
            WHERE instance_id = $1
            "#,
        )
        .bind(instance_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))?;

        record_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>, StoreError> {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT instance_id, workflow_type, status, input, output, error, created_at, updated_at
            FROM orderflow_instances
            WHERE ($1::text IS NULL OR workflow_type = $1)
              AND (cardinality($2::text[]) = 0 OR status = ANY($2))
            ORDER BY created_at, instance_id
            LIMIT $3
            "#,
        )
        .bind(filter.workflow_type.as_deref())
        .bind(&statuses)
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn purge(&self, instance_id: &InstanceId) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM orderflow_instances WHERE instance_id = $1")
            .bind(instance_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(deleted.rows_affected() > 0)
    }
}

fn record_from_row(row: &PgRow) -> Result<InstanceRecord, StoreError> {
    let error_json: Option<serde_json::Value> = row.get("error");
    let error = error_json
        .map(serde_json::from_value::<WorkflowError>)
        .transpose()
        .map_err(ser_error)?;

    Ok(InstanceRecord {
        instance_id: InstanceId::from(row.get::<String, _>("instance_id")),
        workflow_type: row.get("workflow_type"),
        status: parse_status(row.get("status"))?,
        input: row.get("input"),
        output: row.get("output"),
        error,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn parse_status(status: &str) -> Result<WorkflowStatus, StoreError> {
    status.parse().map_err(StoreError::Database)
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn ser_error(e: serde_json::Error) -> StoreError {
    StoreError::Serialization(e.to_string())
}
