use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(String),

    #[error("audit pipeline is shutting down")]
    ShuttingDown,
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;
