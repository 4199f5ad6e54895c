//! The typed configuration tree. Mirrors exactly the surface named in the
//! external-interfaces section: `server.*`, `database.*`, `authorization.*`,
//! `bootstrapSecrets.*`, `audit.*`, `cache.*`, `rateLimit.*`,
//! `circuitBreaker.*`, `transaction.*`, `tokenTTL`, plus `kms.*` for
//! provider selection.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub authorization: AuthorizationConfig,
    pub bootstrap_secrets: BootstrapSecretsConfig,
    #[validate(nested)]
    pub audit: AuditConfig,
    #[validate(nested)]
    pub cache: CacheConfig,
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[validate(nested)]
    pub transaction: TransactionConfig,
    #[validate(range(min = 1))]
    pub token_ttl_seconds: u64,
    #[validate(nested)]
    pub kms: KmsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(nested)]
    pub tls: ServerTlsConfig,
    pub mode: ServerMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ServerTlsConfig {
    pub enabled: bool,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(nested)]
    pub tls: DatabaseTlsConfig,
    #[validate(nested)]
    pub connection: ConnectionPoolConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DatabaseTlsConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConnectionPoolConfig {
    #[validate(range(min = 1))]
    pub max_conns: u32,
    #[validate(range(min = 0))]
    pub min_conns: u32,
    pub max_conn_idle_time_secs: u64,
    pub max_conn_lifetime_secs: u64,
    pub health_check_period_secs: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_conns: 10,
            min_conns: 1,
            max_conn_idle_time_secs: 600,
            max_conn_lifetime_secs: 1800,
            health_check_period_secs: 30,
        }
    }
}

/// Policies are opaque strings to this system (no policy DSL); this is
/// simply the tier-to-storage-profile table plus any free-form policy
/// defaults an operator wants baked in at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub default_policies: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapSecretsConfig {
    pub jwt_rsa_private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuditConfig {
    #[validate(range(min = 1))]
    pub channel_buffer_size: usize,
    #[validate(range(min = 1))]
    pub worker_count: usize,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 10_000,
            worker_count: 4,
            batch_size: 100,
            batch_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 120,
            cleanup_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    #[validate(range(min = 1))]
    pub rate: u32,
    #[validate(range(min = 1))]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { rate: 10, burst: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CircuitBreakerConfig {
    #[validate(range(min = 1))]
    pub max_failures: u32,
    pub reset_timeout_ms: u64,
    pub call_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout_ms: 30_000,
            call_timeout_ms: 2_000,
            half_open_requests: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransactionConfig {
    #[validate(range(min = 1, max = 20))]
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 10,
            max_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KmsProviderKind {
    Software,
    Aws,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KmsConfig {
    pub provider: KmsProviderKind,
    pub aws_region: Option<String>,
    pub software_kek_base64: Option<String>,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            provider: KmsProviderKind::Software,
            aws_region: None,
            software_kek_base64: None,
        }
    }
}
