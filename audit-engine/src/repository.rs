//! Persistence seam for the audit pipeline. `database-layer` provides the
//! Postgres implementation; this trait exists here (not there) so the
//! pipeline never depends on a concrete storage engine.
use crate::entry::AuditEvent;
use crate::error::AuditResult;
use async_trait::async_trait;

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert_batch(&self, events: &[AuditEvent]) -> AuditResult<()>;
}
