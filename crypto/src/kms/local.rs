//! Software-backed key management: wraps data encryption keys under an
//! in-process key-encryption key instead of delegating to an external KMS.
//! Used for the "standard" storage profile; the "hardened" profile goes
//! through [`super::aws::AwsKmsProvider`] or [`super::vault::VaultKmsProvider`]
//! instead.

use super::traits::{
    AuditLogEntry, KeyManagementService, KeyMetadata, KeyOrigin, KeyRotationPolicy, KeyState,
    KeyUsage, KmsResult,
};
use crate::aes_gcm::{Aes256GcmEncryptor, KeyGenerator};
use crate::encryption::Encryptor;
use crate::error::CryptoError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use zeroize::Zeroizing;

struct StoredKey {
    kek: Aes256GcmEncryptor,
    metadata: KeyMetadata,
    rotation: KeyRotationPolicy,
    aliases: Vec<String>,
}

/// In-memory key-encryption-key store. Every key encryption key it holds
/// lives only for the lifetime of the process; nothing here is durable
/// across restarts, which is why it backs the "standard" profile and not
/// "hardened".
pub struct SoftwareKmsProvider {
    keys: RwLock<HashMap<String, StoredKey>>,
    alias_index: RwLock<HashMap<String, String>>,
}

impl SoftwareKmsProvider {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            alias_index: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the provider with a single key-encryption key, useful when the
    /// deployment wants a deterministic `kek_id` known ahead of time rather
    /// than one minted on first `create_key` call.
    pub fn with_key(self, key_id: impl Into<String>, kek: [u8; 32]) -> KmsResult<Self> {
        let key_id = key_id.into();
        let encryptor = Aes256GcmEncryptor::new(kek)?;
        let metadata = KeyMetadata {
            key_id: key_id.clone(),
            alias: None,
            created_at: Utc::now(),
            state: KeyState::Enabled,
            usage: KeyUsage::EncryptDecrypt,
            algorithm: "AES-256-GCM".to_string(),
            origin: KeyOrigin::External,
            last_rotated: None,
            next_rotation: None,
            description: Some("seeded local key-encryption key".to_string()),
            tags: HashMap::new(),
        };
        let stored = StoredKey {
            kek: encryptor,
            metadata,
            rotation: KeyRotationPolicy {
                enabled: false,
                rotation_period_days: None,
                last_rotated: None,
                next_rotation: None,
            },
            aliases: Vec::new(),
        };
        self.keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?
            .insert(key_id, stored);
        Ok(self)
    }

    fn get_enabled(&self, key_id: &str) -> KmsResult<()> {
        let keys = self
            .keys
            .read()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        match keys.get(key_id) {
            Some(k) if k.metadata.state == KeyState::Enabled => Ok(()),
            Some(k) => Err(CryptoError::InvalidKey(format!(
                "key {key_id} is not enabled (state: {:?})",
                k.metadata.state
            ))),
            None => Err(CryptoError::InvalidKey(format!("unknown key id {key_id}"))),
        }
    }
}

impl Default for SoftwareKmsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyManagementService for SoftwareKmsProvider {
    async fn generate_data_key(
        &self,
        kek_id: &str,
        _key_spec: &str,
        _context: Option<&HashMap<String, String>>,
    ) -> KmsResult<(Zeroizing<Vec<u8>>, Vec<u8>)> {
        self.get_enabled(kek_id)?;
        let plaintext = KeyGenerator::generate_aes256_key();
        let wrapped = self.encrypt(kek_id, &plaintext, None).await?;
        Ok((Zeroizing::new(plaintext.to_vec()), wrapped))
    }

    async fn decrypt_data_key(
        &self,
        encrypted_dek: &[u8],
        context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Zeroizing<Vec<u8>>> {
        self.decrypt(encrypted_dek, context).await
    }

    async fn encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
        _context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Vec<u8>> {
        let keys = self
            .keys
            .read()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        let ciphertext = stored.kek.encrypt(plaintext)?;
        let mut framed = Vec::with_capacity(key_id.len() + 1 + ciphertext.len());
        framed.extend_from_slice(key_id.as_bytes());
        framed.push(0);
        framed.extend_from_slice(&ciphertext);
        Ok(framed)
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        _context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Zeroizing<Vec<u8>>> {
        let split = ciphertext
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| CryptoError::InvalidFormat("missing key id frame".to_string()))?;
        let key_id = std::str::from_utf8(&ciphertext[..split])
            .map_err(|_| CryptoError::InvalidUtf8)?
            .to_string();
        let payload = &ciphertext[split + 1..];
        let keys = self
            .keys
            .read()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get(&key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        let plaintext = stored.kek.decrypt(payload)?;
        Ok(Zeroizing::new(plaintext))
    }

    async fn re_encrypt(
        &self,
        ciphertext: &[u8],
        new_key_id: &str,
        source_context: Option<&HashMap<String, String>>,
        dest_context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Vec<u8>> {
        let plaintext = self.decrypt(ciphertext, source_context).await?;
        self.encrypt(new_key_id, &plaintext, dest_context).await
    }

    async fn create_key(
        &self,
        description: &str,
        _key_spec: &str,
        key_usage: KeyUsage,
        tags: Option<HashMap<String, String>>,
    ) -> KmsResult<KeyMetadata> {
        let key_id = uuid::Uuid::new_v4().to_string();
        let encryptor = Aes256GcmEncryptor::new(KeyGenerator::generate_aes256_key())?;
        let metadata = KeyMetadata {
            key_id: key_id.clone(),
            alias: None,
            created_at: Utc::now(),
            state: KeyState::Enabled,
            usage: key_usage,
            algorithm: "AES-256-GCM".to_string(),
            origin: KeyOrigin::Kms,
            last_rotated: None,
            next_rotation: None,
            description: Some(description.to_string()),
            tags: tags.unwrap_or_default(),
        };
        let stored = StoredKey {
            kek: encryptor,
            metadata: metadata.clone(),
            rotation: KeyRotationPolicy {
                enabled: false,
                rotation_period_days: None,
                last_rotated: None,
                next_rotation: None,
            },
            aliases: Vec::new(),
        };
        self.keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?
            .insert(key_id, stored);
        Ok(metadata)
    }

    async fn describe_key(&self, key_id: &str) -> KmsResult<KeyMetadata> {
        let keys = self
            .keys
            .read()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        keys.get(key_id)
            .map(|k| k.metadata.clone())
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))
    }

    async fn list_keys(&self, max_results: Option<u32>) -> KmsResult<Vec<KeyMetadata>> {
        let keys = self
            .keys
            .read()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let mut out: Vec<KeyMetadata> = keys.values().map(|k| k.metadata.clone()).collect();
        out.sort_by(|a, b| a.key_id.cmp(&b.key_id));
        if let Some(max) = max_results {
            out.truncate(max as usize);
        }
        Ok(out)
    }

    async fn enable_key_rotation(
        &self,
        key_id: &str,
        rotation_period_days: Option<u32>,
    ) -> KmsResult<()> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        stored.rotation.enabled = true;
        stored.rotation.rotation_period_days = rotation_period_days.or(Some(90));
        stored.rotation.next_rotation = stored
            .rotation
            .rotation_period_days
            .map(|days| Utc::now() + chrono::Duration::days(days as i64));
        Ok(())
    }

    async fn disable_key_rotation(&self, key_id: &str) -> KmsResult<()> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        stored.rotation.enabled = false;
        stored.rotation.next_rotation = None;
        Ok(())
    }

    async fn get_key_rotation_status(&self, key_id: &str) -> KmsResult<KeyRotationPolicy> {
        let keys = self
            .keys
            .read()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        keys.get(key_id)
            .map(|k| k.rotation.clone())
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))
    }

    async fn rotate_key(&self, key_id: &str) -> KmsResult<KeyMetadata> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        stored.kek = Aes256GcmEncryptor::new(KeyGenerator::generate_aes256_key())?;
        stored.metadata.last_rotated = Some(Utc::now());
        if let Some(days) = stored.rotation.rotation_period_days {
            stored.rotation.last_rotated = stored.metadata.last_rotated;
            stored.rotation.next_rotation = Some(Utc::now() + chrono::Duration::days(days as i64));
            stored.metadata.next_rotation = stored.rotation.next_rotation;
        }
        Ok(stored.metadata.clone())
    }

    async fn enable_key(&self, key_id: &str) -> KmsResult<()> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        stored.metadata.state = KeyState::Enabled;
        Ok(())
    }

    async fn disable_key(&self, key_id: &str) -> KmsResult<()> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        stored.metadata.state = KeyState::Disabled;
        Ok(())
    }

    async fn schedule_key_deletion(
        &self,
        key_id: &str,
        pending_window_days: u32,
    ) -> KmsResult<chrono::DateTime<Utc>> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        stored.metadata.state = KeyState::PendingDeletion;
        let deletion_date = Utc::now() + chrono::Duration::days(pending_window_days as i64);
        Ok(deletion_date)
    }

    async fn cancel_key_deletion(&self, key_id: &str) -> KmsResult<()> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        let stored = keys
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
        if stored.metadata.state == KeyState::PendingDeletion {
            stored.metadata.state = KeyState::Enabled;
        }
        Ok(())
    }

    async fn create_alias(&self, alias_name: &str, key_id: &str) -> KmsResult<()> {
        {
            let mut keys = self.keys.write().map_err(|_| {
                CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned"))
            })?;
            let stored = keys
                .get_mut(key_id)
                .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))?;
            stored.aliases.push(alias_name.to_string());
        }
        self.alias_index
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("alias index lock poisoned")))?
            .insert(alias_name.to_string(), key_id.to_string());
        Ok(())
    }

    async fn update_alias(&self, alias_name: &str, key_id: &str) -> KmsResult<()> {
        self.delete_alias(alias_name).await.ok();
        self.create_alias(alias_name, key_id).await
    }

    async fn delete_alias(&self, alias_name: &str) -> KmsResult<()> {
        let key_id = self
            .alias_index
            .write()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("alias index lock poisoned")))?
            .remove(alias_name);
        if let Some(key_id) = key_id {
            let mut keys = self.keys.write().map_err(|_| {
                CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned"))
            })?;
            if let Some(stored) = keys.get_mut(&key_id) {
                stored.aliases.retain(|a| a != alias_name);
            }
        }
        Ok(())
    }

    async fn list_aliases(&self, key_id: &str) -> KmsResult<Vec<String>> {
        let keys = self
            .keys
            .read()
            .map_err(|_| CryptoError::InternalError(anyhow::anyhow!("key store lock poisoned")))?;
        keys.get(key_id)
            .map(|k| k.aliases.clone())
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id}")))
    }

    async fn get_key_audit_logs(
        &self,
        _key_id: &str,
        _start_time: chrono::DateTime<Utc>,
        _end_time: chrono::DateTime<Utc>,
    ) -> KmsResult<Vec<AuditLogEntry>> {
        // The software provider keeps no durable operation log of its own;
        // callers rely on the audit pipeline's database-backed trail instead.
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_and_decrypt_data_key_roundtrip() {
        let provider = SoftwareKmsProvider::new();
        let metadata = provider
            .create_key("test kek", "AES_256", KeyUsage::EncryptDecrypt, None)
            .await
            .unwrap();

        let (plaintext, wrapped) = provider
            .generate_data_key(&metadata.key_id, "AES_256", None)
            .await
            .unwrap();
        assert_eq!(plaintext.len(), 32);

        let unwrapped = provider.decrypt_data_key(&wrapped, None).await.unwrap();
        assert_eq!(plaintext.as_slice(), unwrapped.as_slice());
    }

    #[tokio::test]
    async fn disabled_key_rejects_new_data_keys() {
        let provider = SoftwareKmsProvider::new();
        let metadata = provider
            .create_key("test kek", "AES_256", KeyUsage::EncryptDecrypt, None)
            .await
            .unwrap();
        provider.disable_key(&metadata.key_id).await.unwrap();

        let result = provider
            .generate_data_key(&metadata.key_id, "AES_256", None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rotate_key_changes_wrapping_key() {
        let provider = SoftwareKmsProvider::new();
        let metadata = provider
            .create_key("test kek", "AES_256", KeyUsage::EncryptDecrypt, None)
            .await
            .unwrap();
        let (_plaintext, wrapped_before) = provider
            .generate_data_key(&metadata.key_id, "AES_256", None)
            .await
            .unwrap();

        provider.rotate_key(&metadata.key_id).await.unwrap();

        // A DEK wrapped under the old key-encryption key can no longer be
        // unwrapped once the key-encryption key itself has rotated.
        let result = provider.decrypt_data_key(&wrapped_before, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn alias_create_update_delete() {
        let provider = SoftwareKmsProvider::new();
        let metadata = provider
            .create_key("test kek", "AES_256", KeyUsage::EncryptDecrypt, None)
            .await
            .unwrap();
        provider
            .create_alias("primary", &metadata.key_id)
            .await
            .unwrap();
        assert_eq!(
            provider.list_aliases(&metadata.key_id).await.unwrap(),
            vec!["primary".to_string()]
        );
        provider.delete_alias("primary").await.unwrap();
        assert!(provider.list_aliases(&metadata.key_id).await.unwrap().is_empty());
    }
}
