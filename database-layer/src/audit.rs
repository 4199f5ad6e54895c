//! Postgres-backed implementation of `audit_engine`'s `AuditRepository`,
//! writing one row per terminal operation outcome to `audit_events`. This
//! is the sink at the end of the batched audit pipeline, not a logger in
//! its own right — the pipeline decides batching and backpressure.
use audit_engine::{AuditEvent, AuditError, AuditRepository, AuditResult};
use async_trait::async_trait;
use sqlx::PgPool;

pub struct SqlAuditRepository {
    pool: PgPool,
}

impl SqlAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for SqlAuditRepository {
    async fn insert_batch(&self, events: &[AuditEvent]) -> AuditResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

        for event in events {
            let metadata = serde_json::to_value(&event.request_metadata)
                .map_err(|e| AuditError::Storage(e.to_string()))?;
            sqlx::query(
                "INSERT INTO audit_events \
                 (id, client_identity, operation, key_id, auth_decision_id, success, error, timestamp, request_metadata) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(event.id)
            .bind(&event.client_identity)
            .bind(&event.operation)
            .bind(event.key_id)
            .bind(&event.auth_decision_id)
            .bind(event.success)
            .bind(&event.error)
            .bind(event.timestamp)
            .bind(metadata)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(())
    }
}
