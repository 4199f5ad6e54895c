//! Internal-side error reporting: the full classification and context is
//! logged here; only the sanitized view ever reaches a response.
use crate::types::PolykeyError;

pub struct ErrorReporter;

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, error: &PolykeyError) {
        tracing::error!(
            error_id = %error.error_id,
            kind = %error.kind,
            code = error.code,
            class = ?error.kind.classify(),
            context = ?error.context,
            "{}",
            error.message
        );
    }
}
