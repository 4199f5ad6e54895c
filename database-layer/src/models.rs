//! The `Key` domain model and its persisted shape, per the data model
//! section: a versioned, append-mostly record with exactly one active and
//! one max-version row per id.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Rotated,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Aes256,
    ApiKey,
    Rsa4096,
    EcdsaP384,
}

impl KeyType {
    /// `(dekSize, algorithm)` resolution used by `CreateKey`.
    pub fn dek_spec(self) -> (usize, &'static str) {
        match self {
            KeyType::Aes256 => (32, "AES-256-GCM"),
            KeyType::ApiKey => (32, "RAW-256"),
            KeyType::Rsa4096 => (64, "RSA-4096-WRAP"),
            KeyType::EcdsaP384 => (48, "ECDSA-P384-WRAP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Free
    }
}

impl Tier {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("pro") => Tier::Pro,
            Some("enterprise") => Tier::Enterprise,
            _ => Tier::Free,
        }
    }

    /// Tier-to-storage-profile resolution, done once at the service
    /// boundary and threaded nowhere else (the `isPremium` flag style used
    /// in older designs is not used).
    pub fn storage_profile(self) -> StorageProfile {
        match self {
            Tier::Pro | Tier::Enterprise => StorageProfile::Hardened,
            Tier::Free => StorageProfile::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageProfile {
    Standard,
    Hardened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataClassification {
    Public,
    Confidential,
    Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub key_id: Uuid,
    pub version: i32,
    pub key_type: KeyType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub creator_identity: String,
    pub description: String,
    pub tags: HashMap<String, String>,
    pub authorized_contexts: Vec<String>,
    pub access_policies: HashMap<String, String>,
    pub data_classification: DataClassification,
    pub storage_profile: StorageProfile,
    pub access_count: u64,
}

impl KeyMetadata {
    pub fn tier(&self) -> Tier {
        Tier::from_tag(self.tags.get("tier").map(String::as_str))
    }
}

/// The persisted row. One row per `(id, version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    pub id: Uuid,
    pub version: i32,
    pub status: KeyStatus,
    pub metadata: KeyMetadata,
    pub encrypted_dek: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Key {
    pub fn tier(&self) -> Tier {
        self.metadata.tier()
    }
}

/// Row shape as it comes back from `sqlx::query_as` before metadata JSON is
/// deserialized into the typed `KeyMetadata`. Mirrors the two-scan-helper
/// design: this is the variant that includes `id` in the result set.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeyRow {
    pub id: Uuid,
    pub version: i32,
    pub status: String,
    pub metadata: serde_json::Value,
    pub encrypted_dek: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Row shape for queries scoped to a single already-known id (the second
/// scan helper), so `id` is not redundantly selected.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeyRowNoId {
    pub version: i32,
    pub status: String,
    pub metadata: serde_json::Value,
    pub encrypted_dek: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl KeyRow {
    pub fn into_key(self) -> Result<Key, serde_json::Error> {
        Ok(Key {
            id: self.id,
            version: self.version,
            status: parse_status(&self.status),
            metadata: serde_json::from_value(self.metadata)?,
            encrypted_dek: self.encrypted_dek,
            created_at: self.created_at,
            updated_at: self.updated_at,
            revoked_at: self.revoked_at,
        })
    }
}

impl KeyRowNoId {
    pub fn into_key(self, id: Uuid) -> Result<Key, serde_json::Error> {
        Ok(Key {
            id,
            version: self.version,
            status: parse_status(&self.status),
            metadata: serde_json::from_value(self.metadata)?,
            encrypted_dek: self.encrypted_dek,
            created_at: self.created_at,
            updated_at: self.updated_at,
            revoked_at: self.revoked_at,
        })
    }
}

fn parse_status(s: &str) -> KeyStatus {
    match s {
        "active" => KeyStatus::Active,
        "revoked" => KeyStatus::Revoked,
        _ => KeyStatus::Rotated,
    }
}

/// Read-only client/principal record, loaded from an external identity
/// store; the token-issuance flow itself is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub hashed_credential: String,
    pub permissions: Vec<String>,
    pub tier: Tier,
}
