//! Stable string codes for each `ErrorKind`, used in logs and as the one
//! variable part of a sanitized client response.
use crate::types::ErrorKind;

pub fn code_for_kind(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::KeyNotFound => "KEY_NOT_FOUND",
        ErrorKind::InvalidInput => "INVALID_INPUT",
        ErrorKind::KmsFailure => "KMS_FAILURE",
        ErrorKind::Authentication => "AUTHENTICATION_FAILED",
        ErrorKind::Authorization => "AUTHORIZATION_DENIED",
        ErrorKind::Conflict => "CONFLICT",
        ErrorKind::KeyAlreadyExists => "KEY_ALREADY_EXISTS",
        ErrorKind::RateLimit => "RATE_LIMIT_EXCEEDED",
        ErrorKind::External => "EXTERNAL_SERVICE_ERROR",
        ErrorKind::KeyRevoked => "KEY_REVOKED",
        ErrorKind::KeyRotationLocked => "KEY_ROTATION_LOCKED",
        ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
        ErrorKind::EntropyValidationFail => "ENTROPY_VALIDATION_FAILED",
        ErrorKind::Internal => "INTERNAL",
    }
}
