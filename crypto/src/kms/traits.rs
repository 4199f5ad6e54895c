use crate::error::CryptoError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use zeroize::Zeroizing;

pub type KmsResult<T> = Result<T, CryptoError>;

/// Lifecycle state of a key as reported by the backing KMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Enabled,
    Disabled,
    PendingDeletion,
    PendingImport,
    Unavailable,
}

/// Cryptographic usage a KMS-held key was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    EncryptDecrypt,
    SignVerify,
}

/// Where the key material originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Kms,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone)]
pub struct KeyMetadata {
    pub key_id: String,
    pub alias: Option<String>,
    pub created_at: DateTime<Utc>,
    pub state: KeyState,
    pub usage: KeyUsage,
    pub algorithm: String,
    pub origin: KeyOrigin,
    pub last_rotated: Option<DateTime<Utc>>,
    pub next_rotation: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct KeyRotationPolicy {
    pub enabled: bool,
    pub rotation_period_days: Option<u32>,
    pub last_rotated: Option<DateTime<Utc>>,
    pub next_rotation: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub key_id: String,
    pub operation: String,
    pub status: OperationStatus,
    pub timestamp: DateTime<Utc>,
    pub principal: Option<String>,
}

/// Capability interface every KMS backend implements: wrap/unwrap of data
/// encryption keys plus the administrative surface the key lifecycle engine
/// needs for key-encryption-key management. The key service only ever talks
/// to this trait; `SoftwareKmsProvider`, `AwsKmsProvider`, and
/// `VaultKmsProvider` are interchangeable behind it.
#[async_trait]
pub trait KeyManagementService: Send + Sync {
    /// Generate a new data encryption key and return it both in plaintext
    /// (for immediate use, held only in a `Zeroizing` buffer) and wrapped
    /// under `kek_id` (for persistence).
    async fn generate_data_key(
        &self,
        kek_id: &str,
        key_spec: &str,
        context: Option<&HashMap<String, String>>,
    ) -> KmsResult<(Zeroizing<Vec<u8>>, Vec<u8>)>;

    /// Unwrap a previously wrapped data encryption key.
    async fn decrypt_data_key(
        &self,
        encrypted_dek: &[u8],
        context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Zeroizing<Vec<u8>>>;

    /// Encrypt a small plaintext directly under a KMS-held key (no DEK).
    async fn encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
        context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Vec<u8>>;

    /// Decrypt a blob produced by `encrypt`.
    async fn decrypt(
        &self,
        ciphertext: &[u8],
        context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Zeroizing<Vec<u8>>>;

    /// Re-encrypt a ciphertext under a different key without exposing
    /// plaintext to the caller.
    async fn re_encrypt(
        &self,
        ciphertext: &[u8],
        new_key_id: &str,
        source_context: Option<&HashMap<String, String>>,
        dest_context: Option<&HashMap<String, String>>,
    ) -> KmsResult<Vec<u8>>;

    async fn create_key(
        &self,
        description: &str,
        key_spec: &str,
        key_usage: KeyUsage,
        tags: Option<HashMap<String, String>>,
    ) -> KmsResult<KeyMetadata>;

    async fn describe_key(&self, key_id: &str) -> KmsResult<KeyMetadata>;

    async fn list_keys(&self, max_results: Option<u32>) -> KmsResult<Vec<KeyMetadata>>;

    async fn enable_key_rotation(
        &self,
        key_id: &str,
        rotation_period_days: Option<u32>,
    ) -> KmsResult<()>;

    async fn disable_key_rotation(&self, key_id: &str) -> KmsResult<()>;

    async fn get_key_rotation_status(&self, key_id: &str) -> KmsResult<KeyRotationPolicy>;

    async fn rotate_key(&self, key_id: &str) -> KmsResult<KeyMetadata>;

    async fn enable_key(&self, key_id: &str) -> KmsResult<()>;

    async fn disable_key(&self, key_id: &str) -> KmsResult<()>;

    async fn schedule_key_deletion(
        &self,
        key_id: &str,
        pending_window_days: u32,
    ) -> KmsResult<DateTime<Utc>>;

    async fn cancel_key_deletion(&self, key_id: &str) -> KmsResult<()>;

    async fn create_alias(&self, alias_name: &str, key_id: &str) -> KmsResult<()>;

    async fn update_alias(&self, alias_name: &str, key_id: &str) -> KmsResult<()>;

    async fn delete_alias(&self, alias_name: &str) -> KmsResult<()>;

    async fn list_aliases(&self, key_id: &str) -> KmsResult<Vec<String>>;

    async fn get_key_audit_logs(
        &self,
        key_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> KmsResult<Vec<AuditLogEntry>>;
}
