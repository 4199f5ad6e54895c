//! Postgres persistence for the key-lifecycle store: a versioned
//! `KeyRepository` wrapped in a write-through cache and a circuit breaker,
//! a serializable-retry transaction helper for multi-statement mutations,
//! and the SQL sink for the audit pipeline.
pub mod audit;
pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod transaction;

pub use audit::SqlAuditRepository;
pub use cache::CachingKeyRepository;
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakingKeyRepository, CircuitState, TransitionCallback};
pub use error::{DatabaseError, DatabaseResult};
pub use models::{Client, DataClassification, Key, KeyMetadata, KeyStatus, KeyType, StorageProfile, Tier};
pub use pool::{connect, health_check_loop, PoolConfig};
pub use repository::{advisory_lock_key, KeyRepository, SqlKeyRepository};
pub use transaction::{RetryConfig, TransactionManager};
