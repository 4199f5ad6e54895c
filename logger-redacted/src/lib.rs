//! Structured, redaction-aware logging for Polykey.
//!
//! Built on `tracing`/`tracing-subscriber`. The one rule this crate exists
//! to enforce: plaintext DEKs, wrapped key bytes, bearer tokens, and hashed
//! credentials never reach a log macro. Call sites log identifiers only
//! (key id, version, operation name, decision id, requester id); anything
//! else a caller passes through a free-form metadata map is degraded by
//! [`redactor::redact_value`] before it reaches a log line.

pub mod config;
pub mod init;
pub mod macros;
pub mod redactor;

pub use config::LoggerConfig;
pub use init::init_tracing;
pub use redactor::{redact_metadata, redact_value, RedactionConfig};
