//! Maps this crate's two collaborator error types (`crypto::CryptoError`,
//! `database_layer::DatabaseError`) onto the workspace-wide `PolykeyError`
//! taxonomy. Every public operation in [`crate::service`] returns
//! `KeyServiceResult<T>`.
use database_layer::DatabaseError;
use error_common::{ErrorKind, PolykeyError};
use thiserror::Error;

pub type KeyServiceResult<T> = Result<T, KeyServiceError>;

#[derive(Debug, Error)]
pub enum KeyServiceError {
    #[error(transparent)]
    Polykey(#[from] PolykeyError),
    #[error(transparent)]
    Kms(#[from] crypto::CryptoError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl KeyServiceError {
    pub fn into_polykey(self) -> PolykeyError {
        match self {
            KeyServiceError::Polykey(err) => err,
            KeyServiceError::Kms(crypto::CryptoError::EntropyValidationFailed {
                popcount,
                low,
                high,
                bits,
            }) => PolykeyError::builder(ErrorKind::EntropyValidationFail)
                .message(format!(
                    "DEK entropy check failed: popcount {popcount} outside [{low}, {high}] of {bits} bits"
                ))
                .build(),
            KeyServiceError::Kms(err) => PolykeyError::builder(ErrorKind::KmsFailure)
                .message(err.to_string())
                .build(),
            KeyServiceError::Database(DatabaseError::NotFound) => {
                PolykeyError::builder(ErrorKind::KeyNotFound)
                    .message("key not found")
                    .not_sensitive()
                    .build()
            }
            KeyServiceError::Database(DatabaseError::UniqueViolation) => {
                PolykeyError::builder(ErrorKind::KeyAlreadyExists)
                    .message("key already exists")
                    .build()
            }
            KeyServiceError::Database(DatabaseError::PoolExhausted) => {
                PolykeyError::builder(ErrorKind::CircuitOpen)
                    .message("repository unavailable")
                    .build()
            }
            KeyServiceError::Database(DatabaseError::LockContended) => {
                PolykeyError::builder(ErrorKind::KeyRotationLocked)
                    .message("key is already being rotated")
                    .not_sensitive()
                    .build()
            }
            KeyServiceError::Database(DatabaseError::SerializationConflict) => {
                PolykeyError::builder(ErrorKind::Conflict)
                    .message("rotation could not be serialized after all retries")
                    .build()
            }
            KeyServiceError::Database(err) => PolykeyError::builder(ErrorKind::Internal)
                .message(err.to_string())
                .build(),
        }
    }
}
