//! The key-lifecycle orchestrator. One [`KeyService`] is constructed once
//! at startup and shared (behind an `Arc`) by every transport handler; it
//! owns no per-request state beyond what is threaded through its method
//! arguments.
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use database_layer::{DataClassification, Key, KeyMetadata, KeyRepository, KeyStatus};
use error_common::{ErrorKind, PolykeyError};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::dek_pool::DekBufferPool;
use crate::error::{KeyServiceError, KeyServiceResult};
use crate::kms_selector::{KmsProviderMap, UnwrapCache};
use crate::requester::RequesterContext;
use crate::types::*;

/// Tunables that are process-wide rather than per-request. Defaults mirror
/// the documented configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct KeyServiceConfig {
    pub unwrap_cache_ttl: std::time::Duration,
    pub batch_concurrency: usize,
}

impl Default for KeyServiceConfig {
    fn default() -> Self {
        Self {
            unwrap_cache_ttl: std::time::Duration::from_secs(300),
            batch_concurrency: 10,
        }
    }
}

pub struct KeyService {
    repo: Arc<dyn KeyRepository>,
    kms: KmsProviderMap,
    unwrap_cache: UnwrapCache,
    dek_pool: DekBufferPool,
    audit: Arc<audit_engine::AuditPipeline>,
    batch_concurrency: usize,
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn key_context(id: Uuid) -> std::collections::HashMap<String, String> {
    let mut ctx = std::collections::HashMap::with_capacity(1);
    ctx.insert("keyId".to_string(), id.to_string());
    ctx
}

fn validate_version(version: Option<i32>) -> KeyServiceResult<()> {
    if let Some(v) = version {
        if v <= 0 {
            return Err(PolykeyError::builder(ErrorKind::InvalidInput)
                .message("version must be >= 1")
                .not_sensitive()
                .build()
                .into());
        }
    }
    Ok(())
}

fn empty_identity_error() -> KeyServiceError {
    PolykeyError::builder(ErrorKind::Authentication)
        .message("requester identity is empty")
        .not_sensitive()
        .build()
        .into()
}

/// Runs `futures` with at most `concurrency` running at once, preserving
/// input order in the returned vector. This is the bounded worker pool the
/// batch operations fan out through. A worker task that fails to join
/// (panicked or was cancelled) fails the whole batch with an internal
/// error rather than unwinding the caller.
async fn fan_out<R: Send + 'static>(
    concurrency: usize,
    futures: Vec<Pin<Box<dyn Future<Output = R> + Send>>>,
) -> KeyServiceResult<Vec<R>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(futures.len());
    for fut in futures {
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            // The semaphore is never closed, so `acquire_owned` only ever
            // returns `Err` in a configuration this code never reaches;
            // `.ok()` degrades to unbounded concurrency for that future
            // rather than panicking on an invariant that never breaks.
            let _permit = semaphore.acquire_owned().await.ok();
            fut.await
        }));
    }
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(value) => results.push(value),
            Err(err) => {
                return Err(PolykeyError::builder(ErrorKind::Internal)
                    .message(format!("batch worker task did not complete: {err}"))
                    .build()
                    .into());
            }
        }
    }
    Ok(results)
}

impl KeyService {
    pub fn new(
        repo: Arc<dyn KeyRepository>,
        kms: KmsProviderMap,
        audit: Arc<audit_engine::AuditPipeline>,
        config: KeyServiceConfig,
    ) -> Self {
        Self {
            repo,
            kms,
            unwrap_cache: UnwrapCache::new(config.unwrap_cache_ttl),
            dek_pool: DekBufferPool::new(),
            audit,
            batch_concurrency: config.batch_concurrency,
        }
    }

    /// Sweeps expired unwrap-cache entries. Call this from a background
    /// interval task; it does not spawn one itself.
    pub fn sweep_unwrap_cache(&self) {
        self.unwrap_cache.sweep();
    }

    fn emit_audit<T>(&self, requester: &RequesterContext, operation: &str, key_id: Option<Uuid>, outcome: &KeyServiceResult<T>) {
        let mut event = match outcome {
            Ok(_) => audit_engine::AuditEvent::success(operation, requester.user_id.clone()),
            Err(err) => audit_engine::AuditEvent::failure(operation, requester.user_id.clone(), err.to_string()),
        };
        if let Some(id) = key_id {
            event = event.with_key_id(id);
        }
        self.audit.record(event);
    }

    // ---- CreateKey -------------------------------------------------

    pub async fn create_key(&self, req: CreateKeyRequest) -> KeyServiceResult<CreateKeyResponse> {
        let requester = req.requester.clone();
        let outcome = self.create_key_inner(req).await;
        self.emit_audit(&requester, "CreateKey", outcome.as_ref().ok().map(|r| r.key_id), &outcome);
        outcome
    }

    async fn create_key_inner(&self, req: CreateKeyRequest) -> KeyServiceResult<CreateKeyResponse> {
        if req.requester.is_empty_identity() {
            return Err(empty_identity_error());
        }

        let storage_profile = req.requester.tier.storage_profile();
        let (dek_size, algorithm) = req.key_type.dek_spec();
        let id = Uuid::new_v4();
        let context = key_context(id);

        let dek = self.dek_pool.acquire_random(dek_size)?;
        let (provider, kek_id) = self.kms.for_profile(storage_profile);
        let wrapped = provider.encrypt(kek_id, dek.as_slice(), Some(&context)).await?;
        let checksum = hex_encode(&Sha256::digest(dek.as_slice()));
        drop(dek);

        let now = Utc::now();
        let metadata = KeyMetadata {
            key_id: id,
            version: 1,
            key_type: req.key_type,
            created_at: now,
            updated_at: now,
            expires_at: req.expires_at,
            creator_identity: req.requester.user_id.clone(),
            description: req.description.unwrap_or_default(),
            tags: req.tags,
            authorized_contexts: req.authorized_contexts,
            access_policies: req.access_policies,
            data_classification: req.data_classification.unwrap_or(DataClassification::Public),
            storage_profile,
            access_count: 0,
        };
        let key = Key {
            id,
            version: 1,
            status: KeyStatus::Active,
            metadata,
            encrypted_dek: wrapped,
            created_at: now,
            updated_at: now,
            revoked_at: None,
        };

        let created = self.repo.create(&key).await?;
        Ok(CreateKeyResponse {
            key_id: created.id,
            metadata: created.metadata,
            key_material: WrappedKeyMaterial {
                wrapped: created.encrypted_dek,
                algorithm: algorithm.to_string(),
                checksum: Some(checksum),
            },
            response_timestamp: Utc::now(),
        })
    }

    // ---- GetKey ------------------------------------------------------

    pub async fn get_key(&self, req: GetKeyRequest) -> KeyServiceResult<GetKeyResponse> {
        let requester = req.requester.clone();
        let key_id = req.key_id;
        let outcome = self.get_key_inner(req).await;
        self.emit_audit(&requester, "GetKey", Some(key_id), &outcome);
        outcome
    }

    async fn get_key_inner(&self, req: GetKeyRequest) -> KeyServiceResult<GetKeyResponse> {
        validate_version(req.version)?;

        let key = match req.version {
            Some(v) => self.repo.get_by_version(req.key_id, v).await?,
            None => self.repo.get_latest(req.key_id).await?,
        };
        if key.status == KeyStatus::Revoked {
            return Err(PolykeyError::builder(ErrorKind::KeyRevoked)
                .message("key has been revoked")
                .not_sensitive()
                .build()
                .into());
        }

        let (provider, _) = self.kms.for_profile(key.metadata.storage_profile);
        let context = key_context(key.id);
        let plaintext = self.unwrap_cache.unwrap(provider, &key.encrypted_dek, Some(&context)).await?;
        let checksum = hex_encode(&Sha256::digest(plaintext.as_slice()));
        drop(plaintext);

        let (_, algorithm) = key.metadata.key_type.dek_spec();
        Ok(GetKeyResponse {
            key_material: WrappedKeyMaterial {
                wrapped: key.encrypted_dek,
                algorithm: algorithm.to_string(),
                checksum: Some(checksum),
            },
            metadata: if req.skip_metadata { None } else { Some(key.metadata) },
            response_timestamp: Utc::now(),
            authorization_decision_id: None,
        })
    }

    // ---- GetKeyMetadata ------------------------------------------------

    pub async fn get_key_metadata(&self, req: GetKeyMetadataRequest) -> KeyServiceResult<GetKeyMetadataResponse> {
        let requester = req.requester.clone();
        let key_id = req.key_id;
        let outcome = self.get_key_metadata_inner(req).await;
        self.emit_audit(&requester, "GetKeyMetadata", Some(key_id), &outcome);
        outcome
    }

    async fn get_key_metadata_inner(&self, req: GetKeyMetadataRequest) -> KeyServiceResult<GetKeyMetadataResponse> {
        validate_version(req.version)?;
        let key = match req.version {
            Some(v) => self.repo.get_by_version(req.key_id, v).await?,
            None => self.repo.get_latest(req.key_id).await?,
        };

        let policy_details = if req.include_policy_details {
            key.metadata.access_policies.clone()
        } else {
            std::collections::HashMap::new()
        };
        let access_history = if req.include_access_history { Some(Vec::new()) } else { None };

        Ok(GetKeyMetadataResponse {
            metadata: key.metadata,
            access_history,
            policy_details,
            response_timestamp: Utc::now(),
        })
    }

    // ---- ListKeys ------------------------------------------------------

    pub async fn list_keys(&self, req: ListKeysRequest) -> KeyServiceResult<ListKeysResponse> {
        let requester = req.requester.clone();
        let outcome = self.list_keys_inner(req).await;
        self.emit_audit(&requester, "ListKeys", None, &outcome);
        outcome
    }

    async fn list_keys_inner(&self, req: ListKeysRequest) -> KeyServiceResult<ListKeysResponse> {
        let limit = match req.page_size {
            None | Some(0) => 100,
            Some(n) if n > 1000 => {
                return Err(PolykeyError::builder(ErrorKind::InvalidInput)
                    .message("page size exceeds the maximum of 1000")
                    .not_sensitive()
                    .build()
                    .into())
            }
            Some(n) => n,
        };
        if let (Some(after), Some(before)) = (req.created_after, req.created_before) {
            if after > before {
                return Err(PolykeyError::builder(ErrorKind::InvalidInput)
                    .message("createdAfter must not be later than createdBefore")
                    .not_sensitive()
                    .build()
                    .into());
            }
            if before - after > ChronoDuration::days(365) {
                return Err(PolykeyError::builder(ErrorKind::InvalidInput)
                    .message("createdAfter/createdBefore range exceeds one year")
                    .not_sensitive()
                    .build()
                    .into());
            }
        }

        let rows = self.repo.list_paginated(req.page_token, limit).await?;
        let total_count = rows.len() as i64;
        let filtered: Vec<Key> = if req.tag_filters.is_empty() {
            rows
        } else {
            rows.into_iter()
                .filter(|k| req.tag_filters.iter().all(|(k2, v2)| k.metadata.tags.get(k2) == Some(v2)))
                .collect()
        };
        let filtered_count = filtered.len() as i64;
        let next_page_token = filtered.last().map(|k| k.id.to_string());

        Ok(ListKeysResponse {
            keys: filtered.into_iter().map(|k| k.metadata).collect(),
            next_page_token,
            total_count,
            filtered_count,
            response_timestamp: Utc::now(),
        })
    }

    // ---- RotateKey -----------------------------------------------------

    pub async fn rotate_key(&self, req: RotateKeyRequest) -> KeyServiceResult<RotateKeyResponse> {
        let requester = req.requester.clone();
        let key_id = req.key_id;
        let outcome = self.rotate_key_inner(req).await;
        self.emit_audit(&requester, "RotateKey", Some(key_id), &outcome);
        outcome
    }

    async fn rotate_key_inner(&self, req: RotateKeyRequest) -> KeyServiceResult<RotateKeyResponse> {
        let current = self.repo.get_latest(req.key_id).await?;
        if current.status == KeyStatus::Revoked {
            return Err(PolykeyError::builder(ErrorKind::Conflict)
                .message("cannot rotate a revoked key")
                .not_sensitive()
                .build()
                .into());
        }

        let (dek_size, algorithm) = current.metadata.key_type.dek_spec();
        let context = key_context(req.key_id);
        let dek = self.dek_pool.acquire_random(dek_size)?;
        let (provider, kek_id) = self.kms.for_profile(current.metadata.storage_profile);
        let wrapped = provider.encrypt(kek_id, dek.as_slice(), Some(&context)).await?;
        let checksum = hex_encode(&Sha256::digest(dek.as_slice()));
        drop(dek);

        let now = Utc::now();
        let mut metadata = current.metadata.clone();
        metadata.version = current.version + 1;
        metadata.updated_at = now;

        let new_key = Key {
            id: req.key_id,
            version: current.version + 1,
            status: KeyStatus::Active,
            metadata,
            encrypted_dek: wrapped,
            created_at: now,
            updated_at: now,
            revoked_at: None,
        };

        let rotated = self.repo.rotate(req.key_id, &new_key).await?;
        Ok(RotateKeyResponse {
            key_id: rotated.id,
            new_version: rotated.version,
            previous_version: current.version,
            new_key_material: WrappedKeyMaterial {
                wrapped: rotated.encrypted_dek,
                algorithm: algorithm.to_string(),
                checksum: Some(checksum),
            },
            metadata: rotated.metadata,
            rotation_timestamp: now,
            old_version_expires_at: now + ChronoDuration::seconds(req.grace_period_seconds),
        })
    }

    // ---- RevokeKey -----------------------------------------------------

    pub async fn revoke_key(&self, req: RevokeKeyRequest) -> KeyServiceResult<()> {
        let requester = req.requester.clone();
        let key_id = req.key_id;
        let outcome = self.revoke_key_inner(req).await;
        self.emit_audit(&requester, "RevokeKey", Some(key_id), &outcome);
        outcome
    }

    async fn revoke_key_inner(&self, req: RevokeKeyRequest) -> KeyServiceResult<()> {
        let current = self.repo.get_latest(req.key_id).await?;
        if current.status == KeyStatus::Revoked {
            // Idempotent: a second revocation is a no-op, not an error.
            return Ok(());
        }
        self.repo.revoke(req.key_id).await?;
        Ok(())
    }

    // ---- UpdateKeyMetadata ----------------------------------------------

    pub async fn update_key_metadata(&self, req: UpdateKeyMetadataRequest) -> KeyServiceResult<()> {
        let requester = req.requester.clone();
        let key_id = req.key_id;
        let outcome = self.update_key_metadata_inner(req).await;
        if let Some(requester) = requester {
            self.emit_audit(&requester, "UpdateKeyMetadata", Some(key_id), &outcome);
        }
        outcome
    }

    /// Metadata mutation is permitted against any existing row regardless
    /// of status; revocation only blocks *new versions*, not metadata
    /// edits on the one that already exists.
    async fn update_key_metadata_inner(&self, req: UpdateKeyMetadataRequest) -> KeyServiceResult<()> {
        if req.requester.as_ref().map(RequesterContext::is_empty_identity).unwrap_or(true) {
            return Err(empty_identity_error());
        }

        let current = self.repo.get_latest(req.key_id).await?;
        let mut metadata = current.metadata.clone();

        if let Some(description) = req.description {
            metadata.description = description;
        }
        if let Some(expires_at) = req.expires_at {
            metadata.expires_at = Some(expires_at);
        }
        if let Some(classification) = req.data_classification {
            metadata.data_classification = classification;
        }
        for (k, v) in req.tags_to_add {
            metadata.tags.insert(k, v);
        }
        for k in &req.tags_to_remove {
            metadata.tags.remove(k);
        }
        for ctx in req.contexts_to_add {
            if !metadata.authorized_contexts.contains(&ctx) {
                metadata.authorized_contexts.push(ctx);
            }
        }
        metadata.authorized_contexts.retain(|c| !req.contexts_to_remove.contains(c));
        for (k, v) in req.policies_to_update {
            metadata.access_policies.insert(k, v);
        }
        metadata.updated_at = Utc::now();

        let value = serde_json::to_value(&metadata).map_err(|err| {
            KeyServiceError::from(
                PolykeyError::builder(ErrorKind::Internal)
                    .message(err.to_string())
                    .build(),
            )
        })?;
        self.repo.update_metadata(req.key_id, current.version, &value).await?;
        Ok(())
    }

    // ---- Batch operations ------------------------------------------------

    pub async fn batch_get_keys(self: &Arc<Self>, req: BatchGetKeysRequest) -> KeyServiceResult<BatchGetKeysResponse> {
        let continue_on_error = req.continue_on_error;
        let futures: Vec<_> = req
            .key_ids
            .into_iter()
            .map(|key_id| {
                let svc = Arc::clone(self);
                let requester = req.requester.clone();
                Box::pin(async move {
                    svc.get_key(GetKeyRequest {
                        requester,
                        key_id,
                        version: None,
                        skip_metadata: false,
                    })
                    .await
                    .map_err(|err| (key_id, err))
                }) as Pin<Box<dyn Future<Output = Result<GetKeyResponse, (Uuid, KeyServiceError)>> + Send>>
            })
            .collect();

        let mut results = fan_out(self.batch_concurrency, futures).await?;
        if !continue_on_error {
            if let Some(idx) = results.iter().position(Result::is_err) {
                if let Err((_, err)) = results.swap_remove(idx) {
                    return Err(err);
                }
            }
        }

        let mut successful_count = 0usize;
        let mut failed_count = 0usize;
        let mut outcomes = Vec::with_capacity(results.len());
        for r in results {
            match r {
                Ok(resp) => {
                    successful_count += 1;
                    outcomes.push(BatchOutcome::Success(resp));
                }
                Err((key_id, err)) => {
                    failed_count += 1;
                    outcomes.push(BatchOutcome::Error { key_id, message: err.to_string() });
                }
            }
        }
        Ok(BatchGetKeysResponse { results: outcomes, successful_count, failed_count })
    }

    pub async fn batch_get_key_metadata(
        self: &Arc<Self>,
        req: BatchGetKeyMetadataRequest,
    ) -> KeyServiceResult<BatchGetKeyMetadataResponse> {
        let continue_on_error = req.continue_on_error;
        let futures: Vec<_> = req
            .key_ids
            .into_iter()
            .map(|key_id| {
                let svc = Arc::clone(self);
                let requester = req.requester.clone();
                Box::pin(async move {
                    svc.get_key_metadata(GetKeyMetadataRequest {
                        requester,
                        key_id,
                        version: None,
                        include_access_history: false,
                        include_policy_details: false,
                    })
                    .await
                    .map_err(|err| (key_id, err))
                }) as Pin<Box<dyn Future<Output = Result<GetKeyMetadataResponse, (Uuid, KeyServiceError)>> + Send>>
            })
            .collect();

        let mut results = fan_out(self.batch_concurrency, futures).await?;
        if !continue_on_error {
            if let Some(idx) = results.iter().position(Result::is_err) {
                if let Err((_, err)) = results.swap_remove(idx) {
                    return Err(err);
                }
            }
        }

        let mut successful_count = 0usize;
        let mut failed_count = 0usize;
        let mut outcomes = Vec::with_capacity(results.len());
        for r in results {
            match r {
                Ok(resp) => {
                    successful_count += 1;
                    outcomes.push(BatchOutcome::Success(resp));
                }
                Err((key_id, err)) => {
                    failed_count += 1;
                    outcomes.push(BatchOutcome::Error { key_id, message: err.to_string() });
                }
            }
        }
        Ok(BatchGetKeyMetadataResponse { results: outcomes, successful_count, failed_count })
    }

    pub async fn batch_create_keys(
        self: &Arc<Self>,
        req: BatchCreateKeysRequest,
    ) -> KeyServiceResult<BatchCreateKeysResponse> {
        let continue_on_error = req.continue_on_error;
        let futures: Vec<_> = req
            .items
            .into_iter()
            .map(|item| {
                let svc = Arc::clone(self);
                Box::pin(async move { svc.create_key(item).await.map_err(|err| (Uuid::nil(), err)) })
                    as Pin<Box<dyn Future<Output = Result<CreateKeyResponse, (Uuid, KeyServiceError)>> + Send>>
            })
            .collect();

        let mut results = fan_out(self.batch_concurrency, futures).await?;
        if !continue_on_error {
            if let Some(idx) = results.iter().position(Result::is_err) {
                if let Err((_, err)) = results.swap_remove(idx) {
                    return Err(err);
                }
            }
        }

        let mut successful_count = 0usize;
        let mut failed_count = 0usize;
        let mut outcomes = Vec::with_capacity(results.len());
        for r in results {
            match r {
                Ok(resp) => {
                    successful_count += 1;
                    outcomes.push(BatchOutcome::Success(resp));
                }
                Err((key_id, err)) => {
                    failed_count += 1;
                    outcomes.push(BatchOutcome::Error { key_id, message: err.to_string() });
                }
            }
        }
        Ok(BatchCreateKeysResponse { results: outcomes, successful_count, failed_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_zero_is_rejected() {
        assert!(validate_version(Some(0)).is_err());
    }

    #[test]
    fn version_negative_is_rejected() {
        assert!(validate_version(Some(-1)).is_err());
    }

    #[test]
    fn missing_version_is_accepted() {
        assert!(validate_version(None).is_ok());
    }

    #[test]
    fn hex_encode_matches_known_vector() {
        assert_eq!(hex_encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }
}
