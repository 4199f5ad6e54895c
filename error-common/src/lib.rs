//! Shared error taxonomy for Polykey.
//!
//! Every crate in the workspace returns [`PolykeyError`] (or a thin newtype
//! wrapping it) rather than inventing its own error enum. [`ErrorKind`]
//! enumerates the internal taxonomy from the error-handling design; each
//! kind classifies to exactly one public [`ErrorClass`], and
//! [`PolykeyError::sanitized`] is the single point where internal detail is
//! stripped before a value crosses the trust boundary.

pub mod classifier;
pub mod codes;
pub mod context;
pub mod reporting;
pub mod sanitization;
pub mod types;

pub use classifier::{classify, ClassifiedError, ClassifiedErrorPool};
pub use context::ErrorContext;
pub use reporting::ErrorReporter;
pub use types::{ErrorClass, ErrorKind, PolykeyError, PolykeyErrorBuilder, PolykeyResult};
