//! The trust boundary: every internal error this crate can produce becomes
//! a [`tonic::Status`] here, and only here. The mapping follows the
//! status-code table exactly; the message on the wire is always
//! [`PolykeyError::sanitized`]'s public message, never the internal one.
use error_common::{ErrorKind, PolykeyError};
use tonic::{Code, Status};

/// Logs the full internal error, then converts it to the `tonic::Status`
/// a client is allowed to see. Call this at the outermost edge of every
/// RPC handler, never in the middle of the call chain.
pub fn to_status(error: &PolykeyError) -> Status {
    error_common::ErrorReporter::new().report(error);
    let sanitized = error.sanitized();
    let code = match error.kind {
        ErrorKind::InvalidInput | ErrorKind::KeyRevoked => Code::InvalidArgument,
        ErrorKind::Authentication => Code::Unauthenticated,
        ErrorKind::Authorization => Code::PermissionDenied,
        ErrorKind::KeyNotFound => Code::NotFound,
        ErrorKind::KeyAlreadyExists => Code::AlreadyExists,
        ErrorKind::RateLimit => Code::ResourceExhausted,
        ErrorKind::KmsFailure | ErrorKind::CircuitOpen | ErrorKind::External => Code::Unavailable,
        // Rotation-lock contention and a mid-air serialization conflict
        // are both "retry the whole call", which `Aborted` communicates
        // more precisely to a gRPC client than `Internal` would.
        ErrorKind::KeyRotationLocked | ErrorKind::Conflict => Code::Aborted,
        ErrorKind::EntropyValidationFail | ErrorKind::Internal => Code::Internal,
    };
    Status::new(code, sanitized.message)
}

pub trait IntoStatus {
    fn into_status(self) -> Status;
}

impl IntoStatus for key_service::KeyServiceError {
    fn into_status(self) -> Status {
        to_status(&self.into_polykey())
    }
}

impl IntoStatus for PolykeyError {
    fn into_status(self) -> Status {
        to_status(&self)
    }
}
