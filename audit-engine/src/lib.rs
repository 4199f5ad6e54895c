//! Async batched audit pipeline for the key-lifecycle service: every
//! terminal operation outcome becomes an [`AuditEvent`], queued through
//! [`AuditPipeline`] and flushed to whatever [`AuditRepository`] the
//! caller wires in (Postgres, via `database-layer`, in production).
pub mod engine;
pub mod entry;
pub mod error;
pub mod repository;

pub use engine::{AuditPipeline, AuditPipelineConfig};
pub use entry::AuditEvent;
pub use error::{AuditError, AuditResult};
pub use repository::AuditRepository;
