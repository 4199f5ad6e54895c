//! Key-lifecycle orchestration: the create/get/list/rotate/revoke/update
//! operations and their batch variants, sitting between the transport layer
//! and [`database_layer::KeyRepository`] / [`crypto::kms::KeyManagementService`].
pub mod dek_pool;
pub mod error;
pub mod kms_selector;
pub mod requester;
pub mod service;
pub mod types;

pub use error::{KeyServiceError, KeyServiceResult};
pub use kms_selector::{KmsProviderMap, UnwrapCache};
pub use requester::RequesterContext;
pub use service::{KeyService, KeyServiceConfig};
pub use types::*;
