use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("row not found")]
    NotFound,

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("serialization conflict")]
    SerializationConflict,

    #[error("advisory lock held by another transaction")]
    LockContended,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// PostgreSQL SQLSTATE for a serializable-isolation conflict detected at
/// commit time. The transaction manager retries on exactly this code.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

impl DatabaseError {
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                Some(SQLSTATE_SERIALIZATION_FAILURE) => return DatabaseError::SerializationConflict,
                Some(SQLSTATE_UNIQUE_VIOLATION) => return DatabaseError::UniqueViolation,
                _ => {}
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return DatabaseError::NotFound;
        }
        DatabaseError::Sqlx(err)
    }

    pub fn is_serialization_conflict(&self) -> bool {
        matches!(self, DatabaseError::SerializationConflict)
    }
}
