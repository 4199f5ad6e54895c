use crate::codes::code_for_kind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Internal error taxonomy, per the error handling design: every kind maps
/// to exactly one public `ErrorClass` via [`ErrorKind::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    KeyNotFound,
    InvalidInput,
    KmsFailure,
    Authentication,
    Authorization,
    Conflict,
    KeyAlreadyExists,
    RateLimit,
    External,
    KeyRevoked,
    KeyRotationLocked,
    CircuitOpen,
    EntropyValidationFail,
    Internal,
}

/// Public error class a client is allowed to see. The error-class code is
/// the only variable in a client-facing response; everything else about the
/// internal kind is stripped by [`PolykeyError::sanitized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    Internal,
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimit,
    External,
}

impl ErrorKind {
    pub fn classify(self) -> ErrorClass {
        match self {
            ErrorKind::KeyNotFound => ErrorClass::NotFound,
            ErrorKind::InvalidInput => ErrorClass::Validation,
            ErrorKind::KmsFailure => ErrorClass::External,
            ErrorKind::Authentication => ErrorClass::Authentication,
            ErrorKind::Authorization => ErrorClass::Authorization,
            ErrorKind::Conflict => ErrorClass::Conflict,
            ErrorKind::KeyAlreadyExists => ErrorClass::Conflict,
            ErrorKind::RateLimit => ErrorClass::RateLimit,
            ErrorKind::External => ErrorClass::External,
            ErrorKind::KeyRevoked => ErrorClass::Validation,
            ErrorKind::KeyRotationLocked => ErrorClass::Conflict,
            ErrorKind::CircuitOpen => ErrorClass::External,
            ErrorKind::EntropyValidationFail => ErrorClass::Internal,
            ErrorKind::Internal => ErrorClass::Internal,
        }
    }

    /// Whether the propagation policy recovers from this kind transparently
    /// (serialization conflict retry) rather than surfacing it immediately.
    /// Advisory-lock contention (`KeyRotationLocked`) is deliberately *not*
    /// retryable here: retrying rotation is the caller's responsibility.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Conflict)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The single error type shared by every crate in the workspace. Carries
/// enough internal detail for logs (`message`, `context`) while exposing a
/// `sanitized()` view that is safe to place in a client-facing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolykeyError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub context: HashMap<String, String>,
    pub error_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub sensitive: bool,
}

impl PolykeyError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: code_for_kind(kind),
            kind,
            message: message.into(),
            context: HashMap::new(),
            error_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sensitive: true,
        }
    }

    pub fn builder(kind: ErrorKind) -> PolykeyErrorBuilder {
        PolykeyErrorBuilder::new(kind)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Public-facing message: a small fixed set keyed by error class, never
    /// the internal message or context for a `sensitive` error.
    pub fn public_message(&self) -> &'static str {
        match self.kind.classify() {
            ErrorClass::Internal => "an internal error occurred",
            ErrorClass::Validation => "the request was invalid",
            ErrorClass::Authentication => "authentication failed",
            ErrorClass::Authorization => "the operation is not permitted",
            ErrorClass::NotFound => "the requested key was not found",
            ErrorClass::Conflict => "the request conflicts with the current state",
            ErrorClass::RateLimit => "rate limit exceeded",
            ErrorClass::External => "a dependent service is unavailable",
        }
    }

    /// Strip internal detail for anything crossing the trust boundary.
    pub fn sanitized(&self) -> PolykeyError {
        let mut out = self.clone();
        if self.sensitive {
            out.message = self.public_message().to_string();
            out.context.clear();
        }
        out
    }
}

impl std::error::Error for PolykeyError {}

impl fmt::Display for PolykeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (id={})", self.code, self.message, self.error_id)
    }
}

pub struct PolykeyErrorBuilder {
    kind: ErrorKind,
    message: Option<String>,
    context: HashMap<String, String>,
    sensitive: bool,
}

impl PolykeyErrorBuilder {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            context: HashMap::new(),
            sensitive: true,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Mark the error as safe to surface verbatim (no internal detail).
    pub fn not_sensitive(mut self) -> Self {
        self.sensitive = false;
        self
    }

    pub fn build(self) -> PolykeyError {
        PolykeyError {
            code: code_for_kind(self.kind),
            kind: self.kind,
            message: self.message.unwrap_or_else(|| "an error occurred".to_string()),
            context: self.context,
            error_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sensitive: self.sensitive,
        }
    }
}

pub type PolykeyResult<T> = Result<T, PolykeyError>;
