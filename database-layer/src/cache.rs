//! Write-through cache decorator over a [`KeyRepository`]. Keyed by
//! fingerprint (`"<id>:latest"` or `"<id>:v<version>"`), with a secondary
//! id-to-fingerprints index so a mutation can evict every cached view of a
//! key without a reverse scan.
use crate::error::DatabaseResult;
use crate::models::Key;
use crate::repository::KeyRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

fn fingerprint_latest(id: Uuid) -> String {
    format!("{id}:latest")
}

fn fingerprint_version(id: Uuid, version: i32) -> String {
    format!("{id}:v{version}")
}

struct Entry {
    key: Key,
    inserted_at: Instant,
}

pub struct CachingKeyRepository<R: KeyRepository> {
    inner: R,
    primary: Arc<DashMap<String, Entry>>,
    secondary: Arc<DashMap<Uuid, HashSet<String>>>,
    ttl: Duration,
}

impl<R: KeyRepository> CachingKeyRepository<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            primary: Arc::new(DashMap::new()),
            secondary: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Spawns a background sweep that evicts expired entries every
    /// `sweep_interval`. Returns the join handle so the caller can manage
    /// its lifetime; dropping the handle does not stop the task.
    pub fn spawn_sweeper(&self, sweep_interval: Duration) -> tokio::task::JoinHandle<()> {
        let primary = self.primary.clone();
        let secondary = self.secondary.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                let now = Instant::now();
                let expired: Vec<String> = primary
                    .iter()
                    .filter(|entry| now.duration_since(entry.value().inserted_at) > ttl)
                    .map(|entry| entry.key().clone())
                    .collect();
                for fingerprint in expired {
                    if let Some((_, entry)) = primary.remove(&fingerprint) {
                        if let Some(mut fps) = secondary.get_mut(&entry.key.id) {
                            fps.remove(&fingerprint);
                        }
                    }
                }
            }
        })
    }

    fn insert(&self, fingerprint: String, key: Key) {
        self.secondary
            .entry(key.id)
            .or_default()
            .insert(fingerprint.clone());
        self.primary.insert(
            fingerprint,
            Entry {
                key,
                inserted_at: Instant::now(),
            },
        );
    }

    fn get_fresh(&self, fingerprint: &str) -> Option<Key> {
        let entry = self.primary.get(fingerprint)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.key.clone())
    }

    /// Evicts every cached fingerprint for `id`. Called on any mutation so
    /// a cached view never outlives the row it describes.
    fn evict_id(&self, id: Uuid) {
        if let Some((_, fingerprints)) = self.secondary.remove(&id) {
            for fingerprint in fingerprints {
                self.primary.remove(&fingerprint);
            }
        }
    }
}

#[async_trait]
impl<R: KeyRepository> KeyRepository for CachingKeyRepository<R> {
    async fn get_latest(&self, id: Uuid) -> DatabaseResult<Key> {
        let fingerprint = fingerprint_latest(id);
        if let Some(key) = self.get_fresh(&fingerprint) {
            return Ok(key);
        }
        let key = self.inner.get_latest(id).await?;
        self.insert(fingerprint, key.clone());
        Ok(key)
    }

    async fn get_by_version(&self, id: Uuid, version: i32) -> DatabaseResult<Key> {
        let fingerprint = fingerprint_version(id, version);
        if let Some(key) = self.get_fresh(&fingerprint) {
            return Ok(key);
        }
        let key = self.inner.get_by_version(id, version).await?;
        self.insert(fingerprint, key.clone());
        Ok(key)
    }

    async fn create(&self, key: &Key) -> DatabaseResult<Key> {
        let created = self.inner.create(key).await?;
        self.insert(fingerprint_latest(created.id), created.clone());
        self.insert(fingerprint_version(created.id, created.version), created.clone());
        Ok(created)
    }

    async fn update_metadata(&self, id: Uuid, version: i32, metadata: &serde_json::Value) -> DatabaseResult<Key> {
        let updated = self.inner.update_metadata(id, version, metadata).await?;
        self.evict_id(id);
        Ok(updated)
    }

    async fn revoke(&self, id: Uuid) -> DatabaseResult<Key> {
        let revoked = self.inner.revoke(id).await?;
        self.evict_id(id);
        Ok(revoked)
    }

    async fn list_paginated(&self, cursor: Option<Uuid>, limit: i64) -> DatabaseResult<Vec<Key>> {
        // Listing bypasses the cache: it is not addressed by a single
        // fingerprint and its result set changes too often to be worth it.
        self.inner.list_paginated(cursor, limit).await
    }

    async fn check_exists(&self, id: Uuid) -> DatabaseResult<bool> {
        self.inner.check_exists(id).await
    }

    async fn get_versions(&self, id: Uuid) -> DatabaseResult<Vec<Key>> {
        self.inner.get_versions(id).await
    }

    async fn batch_get(&self, ids: &[Uuid]) -> DatabaseResult<Vec<Key>> {
        self.inner.batch_get(ids).await
    }

    async fn rotate(&self, id: Uuid, new_key: &Key) -> DatabaseResult<Key> {
        let rotated = self.inner.rotate(id, new_key).await?;
        self.evict_id(id);
        self.insert(fingerprint_latest(rotated.id), rotated.clone());
        self.insert(fingerprint_version(rotated.id, rotated.version), rotated.clone());
        Ok(rotated)
    }
}
