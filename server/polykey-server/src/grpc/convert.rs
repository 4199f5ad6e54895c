//! Proto-to-domain and domain-to-proto conversions. Every RPC handler
//! converts its request through here before calling into [`key_service`],
//! and converts the response back the same way — the wire shape and the
//! domain shape never mix in a handler body.
use chrono::{DateTime, Utc};
use database_layer::{DataClassification, KeyMetadata, KeyType};
use tonic::Status;
use uuid::Uuid;

use key_service::WrappedKeyMaterial;

use super::polykey;

pub fn parse_uuid(id: &str, field: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(id).map_err(|_| Status::invalid_argument(format!("{field} is not a valid UUID")))
}

pub fn to_prost_timestamp(ts: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: ts.timestamp(),
        nanos: ts.timestamp_subsec_nanos() as i32,
    }
}

pub fn from_prost_timestamp(ts: Option<prost_types::Timestamp>) -> Option<DateTime<Utc>> {
    ts.and_then(|ts| DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32))
}

pub fn key_type_from_proto(value: i32) -> Result<KeyType, Status> {
    match polykey::KeyType::try_from(value).unwrap_or(polykey::KeyType::Unspecified) {
        polykey::KeyType::Unspecified => Err(Status::invalid_argument("key_type must be specified")),
        polykey::KeyType::Aes256 => Ok(KeyType::Aes256),
        polykey::KeyType::ApiKey => Ok(KeyType::ApiKey),
        polykey::KeyType::Rsa4096 => Ok(KeyType::Rsa4096),
        polykey::KeyType::EcdsaP384 => Ok(KeyType::EcdsaP384),
    }
}

pub fn key_type_to_proto(value: KeyType) -> i32 {
    let proto = match value {
        KeyType::Aes256 => polykey::KeyType::Aes256,
        KeyType::ApiKey => polykey::KeyType::ApiKey,
        KeyType::Rsa4096 => polykey::KeyType::Rsa4096,
        KeyType::EcdsaP384 => polykey::KeyType::EcdsaP384,
    };
    proto as i32
}

/// `dataClassification` is optional on most requests; `0`/unset means "no
/// preference" rather than an error.
pub fn data_classification_from_proto(value: i32) -> Option<DataClassification> {
    match polykey::DataClassification::try_from(value).unwrap_or(polykey::DataClassification::Unspecified) {
        polykey::DataClassification::Unspecified => None,
        polykey::DataClassification::Public => Some(DataClassification::Public),
        polykey::DataClassification::Confidential => Some(DataClassification::Confidential),
        polykey::DataClassification::Secret => Some(DataClassification::Secret),
    }
}

pub fn data_classification_to_proto(value: DataClassification) -> i32 {
    let proto = match value {
        DataClassification::Public => polykey::DataClassification::Public,
        DataClassification::Confidential => polykey::DataClassification::Confidential,
        DataClassification::Secret => polykey::DataClassification::Secret,
    };
    proto as i32
}

pub fn key_metadata_to_proto(metadata: &KeyMetadata) -> polykey::KeyMetadata {
    polykey::KeyMetadata {
        key_id: metadata.key_id.to_string(),
        version: metadata.version,
        key_type: key_type_to_proto(metadata.key_type),
        created_at: Some(to_prost_timestamp(metadata.created_at)),
        updated_at: Some(to_prost_timestamp(metadata.updated_at)),
        expires_at: metadata.expires_at.map(to_prost_timestamp),
        creator_identity: metadata.creator_identity.clone(),
        description: metadata.description.clone(),
        tags: metadata.tags.clone(),
        authorized_contexts: metadata.authorized_contexts.clone(),
        access_policies: metadata.access_policies.clone(),
        data_classification: data_classification_to_proto(metadata.data_classification),
        access_count: metadata.access_count,
    }
}

pub fn key_material_to_proto(material: &WrappedKeyMaterial) -> polykey::KeyMaterial {
    polykey::KeyMaterial {
        wrapped: material.wrapped.clone(),
        algorithm: material.algorithm.clone(),
        checksum: material.checksum.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid", "key_id").is_err());
    }

    #[test]
    fn parse_uuid_accepts_valid_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "key_id").unwrap(), id);
    }

    #[test]
    fn timestamp_round_trips_through_prost() {
        let now = Utc::now();
        let prost_ts = to_prost_timestamp(now);
        let back = from_prost_timestamp(Some(prost_ts)).unwrap();
        assert_eq!(back.timestamp(), now.timestamp());
    }

    #[test]
    fn missing_prost_timestamp_becomes_none() {
        assert!(from_prost_timestamp(None).is_none());
    }

    #[test]
    fn key_type_unspecified_is_rejected() {
        assert!(key_type_from_proto(polykey::KeyType::Unspecified as i32).is_err());
    }

    #[test]
    fn key_type_round_trips() {
        for kt in [KeyType::Aes256, KeyType::ApiKey, KeyType::Rsa4096, KeyType::EcdsaP384] {
            let proto = key_type_to_proto(kt);
            assert_eq!(key_type_from_proto(proto).unwrap(), kt);
        }
    }

    #[test]
    fn data_classification_unspecified_is_none() {
        assert_eq!(data_classification_from_proto(polykey::DataClassification::Unspecified as i32), None);
    }

    #[test]
    fn data_classification_round_trips() {
        for dc in [DataClassification::Public, DataClassification::Confidential, DataClassification::Secret] {
            let proto = data_classification_to_proto(dc);
            assert_eq!(data_classification_from_proto(proto), Some(dc));
        }
    }
}
