//! Request/response shapes for every public key-service operation. The
//! transport layer (`server/polykey-server`) converts these to and from
//! protobuf messages; nothing here is protocol-specific.
use chrono::{DateTime, Utc};
use database_layer::{DataClassification, KeyMetadata, KeyType};
use std::collections::HashMap;
use uuid::Uuid;

use crate::requester::RequesterContext;

#[derive(Debug, Clone)]
pub struct WrappedKeyMaterial {
    pub wrapped: Vec<u8>,
    pub algorithm: String,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateKeyRequest {
    pub requester: RequesterContext,
    pub key_type: KeyType,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub authorized_contexts: Vec<String>,
    pub access_policies: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub data_classification: Option<DataClassification>,
}

#[derive(Debug, Clone)]
pub struct CreateKeyResponse {
    pub key_id: Uuid,
    pub metadata: KeyMetadata,
    pub key_material: WrappedKeyMaterial,
    pub response_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GetKeyRequest {
    pub requester: RequesterContext,
    pub key_id: Uuid,
    pub version: Option<i32>,
    pub skip_metadata: bool,
}

#[derive(Debug, Clone)]
pub struct GetKeyResponse {
    pub key_material: WrappedKeyMaterial,
    pub metadata: Option<KeyMetadata>,
    pub response_timestamp: DateTime<Utc>,
    pub authorization_decision_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetKeyMetadataRequest {
    pub requester: RequesterContext,
    pub key_id: Uuid,
    pub version: Option<i32>,
    pub include_access_history: bool,
    pub include_policy_details: bool,
}

#[derive(Debug, Clone)]
pub struct GetKeyMetadataResponse {
    pub metadata: KeyMetadata,
    pub access_history: Option<Vec<String>>,
    pub policy_details: HashMap<String, String>,
    pub response_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ListKeysRequest {
    pub requester: RequesterContext,
    pub page_size: Option<i64>,
    pub page_token: Option<Uuid>,
    pub tag_filters: HashMap<String, String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ListKeysResponse {
    pub keys: Vec<KeyMetadata>,
    pub next_page_token: Option<String>,
    pub total_count: i64,
    pub filtered_count: i64,
    pub response_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RotateKeyRequest {
    pub requester: RequesterContext,
    pub key_id: Uuid,
    pub grace_period_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct RotateKeyResponse {
    pub key_id: Uuid,
    pub new_version: i32,
    pub previous_version: i32,
    pub new_key_material: WrappedKeyMaterial,
    pub metadata: KeyMetadata,
    pub rotation_timestamp: DateTime<Utc>,
    pub old_version_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RevokeKeyRequest {
    pub requester: RequesterContext,
    pub key_id: Uuid,
    pub revocation_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateKeyMetadataRequest {
    pub requester: Option<RequesterContext>,
    pub key_id: Uuid,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub data_classification: Option<DataClassification>,
    pub tags_to_add: HashMap<String, String>,
    pub tags_to_remove: Vec<String>,
    pub contexts_to_add: Vec<String>,
    pub contexts_to_remove: Vec<String>,
    pub policies_to_update: HashMap<String, String>,
}

impl UpdateKeyMetadataRequest {
    pub fn new(requester: RequesterContext, key_id: Uuid) -> Self {
        Self {
            requester: Some(requester),
            key_id,
            ..Default::default()
        }
    }
}

/// Outcome of one item inside a batch call. Mirrors the request order so
/// the caller never has to re-correlate by id.
#[derive(Debug, Clone)]
pub enum BatchOutcome<T> {
    Success(T),
    Error { key_id: Uuid, message: String },
}

#[derive(Debug, Clone)]
pub struct BatchGetKeysRequest {
    pub requester: RequesterContext,
    pub key_ids: Vec<Uuid>,
    pub continue_on_error: bool,
}

#[derive(Debug, Clone)]
pub struct BatchGetKeysResponse {
    pub results: Vec<BatchOutcome<GetKeyResponse>>,
    pub successful_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone)]
pub struct BatchGetKeyMetadataRequest {
    pub requester: RequesterContext,
    pub key_ids: Vec<Uuid>,
    pub continue_on_error: bool,
}

#[derive(Debug, Clone)]
pub struct BatchGetKeyMetadataResponse {
    pub results: Vec<BatchOutcome<GetKeyMetadataResponse>>,
    pub successful_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone)]
pub struct BatchCreateKeysRequest {
    pub requester: RequesterContext,
    pub items: Vec<CreateKeyRequest>,
    pub continue_on_error: bool,
}

#[derive(Debug, Clone)]
pub struct BatchCreateKeysResponse {
    /// One outcome per request item, in request order — the §9 open
    /// question is resolved in favor of echoing the server-assigned id.
    pub results: Vec<BatchOutcome<CreateKeyResponse>>,
    pub successful_count: usize,
    pub failed_count: usize,
}
