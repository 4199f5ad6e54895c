//! SQL adapter for the `Key` aggregate: one row per `(id, version)`, exactly
//! one `active` status row and one max-version row per id, mutated under a
//! Postgres advisory lock keyed by a 64-bit FNV-1a hash of the id.
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{Key, KeyRow, KeyRowNoId, KeyStatus};
use crate::transaction::{RetryConfig, TransactionManager};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// FNV-1a 64-bit, used to derive the `pg_advisory_xact_lock` key from a
/// key id. Collisions only cost extra (harmless) serialization, never
/// correctness, since the lock is scoped per transaction.
pub fn advisory_lock_key(id: Uuid) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for byte in id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i64
}

#[async_trait]
pub trait KeyRepository: Send + Sync {
    async fn get_latest(&self, id: Uuid) -> DatabaseResult<Key>;
    async fn get_by_version(&self, id: Uuid, version: i32) -> DatabaseResult<Key>;
    async fn create(&self, key: &Key) -> DatabaseResult<Key>;
    async fn update_metadata(&self, id: Uuid, version: i32, metadata: &serde_json::Value) -> DatabaseResult<Key>;
    /// Revokes every version of `id`, not just the currently-active one —
    /// revocation terminates the whole lifecycle, so a prior (already
    /// rotated) row must not remain unwrappable after this call.
    async fn revoke(&self, id: Uuid) -> DatabaseResult<Key>;
    async fn list_paginated(&self, cursor: Option<Uuid>, limit: i64) -> DatabaseResult<Vec<Key>>;
    async fn check_exists(&self, id: Uuid) -> DatabaseResult<bool>;
    async fn get_versions(&self, id: Uuid) -> DatabaseResult<Vec<Key>>;
    async fn batch_get(&self, ids: &[Uuid]) -> DatabaseResult<Vec<Key>>;
    /// Inserts the rotated (new) version and marks the prior active row
    /// `rotated`, all under one advisory-locked, serializable transaction.
    async fn rotate(&self, id: Uuid, new_key: &Key) -> DatabaseResult<Key>;
}

pub struct SqlKeyRepository {
    pool: PgPool,
    txm: TransactionManager,
}

impl SqlKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::with_retry_config(pool, RetryConfig::default())
    }

    /// Same as [`SqlKeyRepository::new`], but threading through a
    /// `RetryConfig` sourced from the deployment's own `transaction.*`
    /// configuration instead of the built-in defaults.
    pub fn with_retry_config(pool: PgPool, retry: RetryConfig) -> Self {
        let txm = TransactionManager::new(pool.clone(), retry);
        Self { pool, txm }
    }

    /// Non-blocking per-id lock: `pg_try_advisory_xact_lock` returns `false`
    /// immediately rather than waiting, which is what lets a concurrent
    /// rotation on the same id fail fast with `LockContended` instead of
    /// queueing behind the holder.
    async fn try_lock_id(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> DatabaseResult<bool> {
        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_xact_lock($1)")
            .bind(advisory_lock_key(id))
            .fetch_one(&mut **tx)
            .await
            .map_err(DatabaseError::Sqlx)?;
        Ok(acquired)
    }
}

#[async_trait]
impl KeyRepository for SqlKeyRepository {
    async fn get_latest(&self, id: Uuid) -> DatabaseResult<Key> {
        let row = sqlx::query_as::<_, KeyRowNoId>(
            "SELECT version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at \
             FROM keys WHERE id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        row.into_key(id).map_err(|_| DatabaseError::NotFound)
    }

    async fn get_by_version(&self, id: Uuid, version: i32) -> DatabaseResult<Key> {
        let row = sqlx::query_as::<_, KeyRowNoId>(
            "SELECT version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at \
             FROM keys WHERE id = $1 AND version = $2",
        )
        .bind(id)
        .bind(version)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        row.into_key(id).map_err(|_| DatabaseError::NotFound)
    }

    async fn create(&self, key: &Key) -> DatabaseResult<Key> {
        let metadata = serde_json::to_value(&key.metadata).map_err(|_| DatabaseError::NotFound)?;
        let row = sqlx::query_as::<_, KeyRow>(
            "INSERT INTO keys (id, version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at",
        )
        .bind(key.id)
        .bind(key.version)
        .bind(status_text(key.status))
        .bind(metadata)
        .bind(&key.encrypted_dek)
        .bind(key.created_at)
        .bind(key.updated_at)
        .bind(key.revoked_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        row.into_key().map_err(|_| DatabaseError::NotFound)
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        version: i32,
        metadata: &serde_json::Value,
    ) -> DatabaseResult<Key> {
        // Metadata updates are always permitted, even against a revoked
        // key; only issuing a *new version* is blocked post-revocation.
        let row = sqlx::query_as::<_, KeyRowNoId>(
            "UPDATE keys SET metadata = $3, updated_at = now() \
             WHERE id = $1 AND version = $2 \
             RETURNING version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at",
        )
        .bind(id)
        .bind(version)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        row.into_key(id).map_err(|_| DatabaseError::NotFound)
    }

    async fn revoke(&self, id: Uuid) -> DatabaseResult<Key> {
        let rows = sqlx::query_as::<_, KeyRowNoId>(
            "UPDATE keys SET status = 'revoked', revoked_at = now(), updated_at = now() \
             WHERE id = $1 \
             RETURNING version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        let latest = rows.into_iter().max_by_key(|row| row.version).ok_or(DatabaseError::NotFound)?;
        latest.into_key(id).map_err(|_| DatabaseError::NotFound)
    }

    async fn list_paginated(&self, cursor: Option<Uuid>, limit: i64) -> DatabaseResult<Vec<Key>> {
        let rows = sqlx::query_as::<_, KeyRow>(
            "SELECT id, version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at \
             FROM keys \
             WHERE status = 'active' AND ($1::uuid IS NULL OR id > $1) \
             ORDER BY id ASC LIMIT $2",
        )
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        rows.into_iter()
            .map(|r| r.into_key().map_err(|_| DatabaseError::NotFound))
            .collect()
    }

    async fn check_exists(&self, id: Uuid) -> DatabaseResult<bool> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM keys WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        Ok(row.0)
    }

    async fn get_versions(&self, id: Uuid) -> DatabaseResult<Vec<Key>> {
        let rows = sqlx::query_as::<_, KeyRowNoId>(
            "SELECT version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at \
             FROM keys WHERE id = $1 ORDER BY version ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        rows.into_iter()
            .map(|r| r.into_key(id).map_err(|_| DatabaseError::NotFound))
            .collect()
    }

    async fn batch_get(&self, ids: &[Uuid]) -> DatabaseResult<Vec<Key>> {
        let rows = sqlx::query_as::<_, KeyRow>(
            "SELECT DISTINCT ON (id) id, version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at \
             FROM keys WHERE id = ANY($1) ORDER BY id, version DESC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        rows.into_iter()
            .map(|r| r.into_key().map_err(|_| DatabaseError::NotFound))
            .collect()
    }

    async fn rotate(&self, id: Uuid, new_key: &Key) -> DatabaseResult<Key> {
        let metadata = serde_json::to_value(&new_key.metadata).map_err(|_| DatabaseError::NotFound)?;

        self.txm
            .run_serializable(move |mut tx| {
                let metadata = metadata.clone();
                let new_key = new_key.clone();
                async move {
                    if !Self::try_lock_id(&mut tx, id).await? {
                        return Err(DatabaseError::LockContended);
                    }

                    let retired = sqlx::query(
                        "UPDATE keys SET status = 'rotated', updated_at = now() \
                         WHERE id = $1 AND status = 'active'",
                    )
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::from_sqlx)?;

                    // No active row to retire means the id is unknown or
                    // already revoked; either way there is nothing to
                    // rotate, and inserting a new active version anyway
                    // would resurrect a terminated key.
                    if retired.rows_affected() == 0 {
                        return Err(DatabaseError::NotFound);
                    }

                    let row = sqlx::query_as::<_, KeyRow>(
                        "INSERT INTO keys (id, version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at) \
                         VALUES ($1, $2, 'active', $3, $4, $5, $6, $7) \
                         RETURNING id, version, status, metadata, encrypted_dek, created_at, updated_at, revoked_at",
                    )
                    .bind(id)
                    .bind(new_key.version)
                    .bind(&metadata)
                    .bind(&new_key.encrypted_dek)
                    .bind(new_key.created_at)
                    .bind(new_key.updated_at)
                    .bind(new_key.revoked_at)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(DatabaseError::from_sqlx)?;

                    let key = row.into_key().map_err(|_| DatabaseError::NotFound)?;
                    Ok((tx, key))
                }
            })
            .await
    }
}

fn status_text(status: KeyStatus) -> &'static str {
    match status {
        KeyStatus::Active => "active",
        KeyStatus::Rotated => "rotated",
        KeyStatus::Revoked => "revoked",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_lock_key_is_deterministic() {
        let id = Uuid::nil();
        assert_eq!(advisory_lock_key(id), advisory_lock_key(id));
    }

    #[test]
    fn advisory_lock_key_differs_across_ids() {
        assert_ne!(advisory_lock_key(Uuid::nil()), advisory_lock_key(Uuid::max()));
    }
}
