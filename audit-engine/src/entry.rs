//! The audit event shape produced at the end of every key-lifecycle
//! operation, whether it succeeded or failed.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub client_identity: String,
    pub operation: String,
    pub key_id: Option<Uuid>,
    pub auth_decision_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub request_metadata: HashMap<String, String>,
}

impl AuditEvent {
    pub fn success(operation: impl Into<String>, client_identity: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_identity: client_identity.into(),
            operation: operation.into(),
            key_id: None,
            auth_decision_id: None,
            success: true,
            error: None,
            timestamp: Utc::now(),
            request_metadata: HashMap::new(),
        }
    }

    pub fn failure(
        operation: impl Into<String>,
        client_identity: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_identity: client_identity.into(),
            operation: operation.into(),
            key_id: None,
            auth_decision_id: None,
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
            request_metadata: HashMap::new(),
        }
    }

    pub fn with_key_id(mut self, key_id: Uuid) -> Self {
        self.key_id = Some(key_id);
        self
    }

    pub fn with_auth_decision(mut self, decision_id: impl Into<String>) -> Self {
        self.auth_decision_id = Some(decision_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_metadata.insert(key.into(), value.into());
        self
    }
}
