pub mod local;
pub mod traits;

#[cfg(feature = "aws-kms")]
pub mod aws;

#[cfg(feature = "vault-kms")]
pub mod vault;

pub use local::SoftwareKmsProvider;
pub use traits::{
    AuditLogEntry, KeyManagementService, KeyMetadata, KeyOrigin, KeyRotationPolicy, KeyState,
    KeyUsage, KmsResult, OperationStatus,
};

#[cfg(feature = "aws-kms")]
pub use aws::AwsKmsProvider;

#[cfg(feature = "vault-kms")]
pub use vault::VaultKmsProvider;
