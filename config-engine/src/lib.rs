//! Layered configuration loading for Polykey: a base file, an
//! environment-specific override file, then `.env`/process environment
//! variables, then CLI flags at the binary entry point. Validated once at
//! startup; immutable for the life of the process.

pub mod app_config;
pub mod error;
pub mod loader;

pub use app_config::{
    AppConfig, AuditConfig, AuthorizationConfig, BootstrapSecretsConfig, CacheConfig,
    CircuitBreakerConfig, ConnectionPoolConfig, DatabaseConfig, DatabaseTlsConfig, KmsConfig,
    KmsProviderKind, RateLimitConfig, ServerConfig, ServerMode, ServerTlsConfig, TransactionConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
