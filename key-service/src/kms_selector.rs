//! Maps a key's storage profile to the `KeyManagementService` that wraps
//! and unwraps its DEK, plus the unwrap-result cache described in §4.2.
use crate::error::{KeyServiceError, KeyServiceResult};
use crypto::kms::KeyManagementService;
use database_layer::StorageProfile;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use zeroize::Zeroizing;

#[derive(Clone)]
pub struct KmsProviderMap {
    standard: Arc<dyn KeyManagementService>,
    hardened: Arc<dyn KeyManagementService>,
    standard_kek_id: String,
    hardened_kek_id: String,
}

impl KmsProviderMap {
    pub fn new(
        standard: Arc<dyn KeyManagementService>,
        hardened: Arc<dyn KeyManagementService>,
        standard_kek_id: impl Into<String>,
        hardened_kek_id: impl Into<String>,
    ) -> Self {
        Self {
            standard,
            hardened,
            standard_kek_id: standard_kek_id.into(),
            hardened_kek_id: hardened_kek_id.into(),
        }
    }

    pub fn for_profile(&self, profile: StorageProfile) -> (&Arc<dyn KeyManagementService>, &str) {
        match profile {
            StorageProfile::Standard => (&self.standard, &self.standard_kek_id),
            StorageProfile::Hardened => (&self.hardened, &self.hardened_kek_id),
        }
    }
}

struct CacheEntry {
    plaintext: Zeroizing<Vec<u8>>,
    inserted_at: Instant,
}

/// Decorates unwrap calls with a `fingerprint(wrapped) -> plaintext` cache.
/// Wrap is never cached — only repeated reads of the same wrapped blob
/// benefit, and caching plaintext on the write path would needlessly
/// widen its exposure window.
pub struct UnwrapCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl UnwrapCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn fingerprint(wrapped: &[u8]) -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, wrapped)
    }

    pub async fn unwrap(
        &self,
        provider: &Arc<dyn KeyManagementService>,
        wrapped: &[u8],
        context: Option<&HashMap<String, String>>,
    ) -> KeyServiceResult<Zeroizing<Vec<u8>>> {
        let fingerprint = Self::fingerprint(wrapped);
        if let Some(entry) = self.entries.lock().get(&fingerprint) {
            if entry.inserted_at.elapsed() <= self.ttl {
                return Ok(entry.plaintext.clone());
            }
        }

        let plaintext = provider
            .decrypt(wrapped, context)
            .await
            .map_err(KeyServiceError::Kms)?;

        self.entries.lock().insert(
            fingerprint,
            CacheEntry {
                plaintext: plaintext.clone(),
                inserted_at: Instant::now(),
            },
        );
        Ok(plaintext)
    }

    /// Drops every entry whose TTL has elapsed. The removed plaintext
    /// buffers zeroize on drop.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .retain(|_, entry| now.duration_since(entry.inserted_at) <= self.ttl);
    }
}
