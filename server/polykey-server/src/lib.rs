//! Wires the key-lifecycle engine ([`key_service::KeyService`]) behind the
//! interceptor chain and serves it over tonic. `main.rs` is a thin shell
//! around [`bootstrap`] and [`run`]; everything that can be unit-tested
//! lives here instead.
pub mod client_store;
pub mod error;
pub mod grpc;
pub mod interceptors;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use config_engine::{AppConfig, KmsProviderKind, ServerMode};
use database_layer::{
    CachingKeyRepository, CircuitBreakerConfig as DbCircuitBreakerConfig, CircuitBreakingKeyRepository, KeyRepository,
    PoolConfig, SqlAuditRepository, SqlKeyRepository,
};
use key_service::{KeyService, KeyServiceConfig, KmsProviderMap};
use tokio::task::JoinHandle;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;

use crate::client_store::SqlClientRepository;
use crate::interceptors::{Authenticator, Authorizer, InterceptorChain, RateLimiter};

/// Everything [`run`] needs once configuration has been loaded and every
/// collaborator constructed. Kept as a struct (rather than a tuple of
/// arguments to `run`) so tests can construct a fake one without going
/// through the whole bootstrap sequence.
pub struct Bootstrapped {
    pub key_service: Arc<KeyService>,
    pub key_service_impl: grpc::KeyServiceImpl,
    pub auth_service_impl: grpc::AuthServiceImpl,
    pub audit_workers: Vec<JoinHandle<()>>,
    pub background_tasks: Vec<JoinHandle<()>>,
}

fn decode_kek(base64_kek: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(base64_kek)?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("kms.softwareKekBase64 must decode to exactly 32 bytes"))
}

async fn build_kms_providers(config: &AppConfig) -> anyhow::Result<KmsProviderMap> {
    let software_kek = config
        .kms
        .software_kek_base64
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("kms.softwareKekBase64 is required"))?;
    let standard: Arc<dyn crypto::kms::KeyManagementService> =
        Arc::new(crypto::kms::SoftwareKmsProvider::new().with_key("standard-kek", decode_kek(software_kek)?)?);

    let hardened: Arc<dyn crypto::kms::KeyManagementService> = match config.kms.provider {
        #[cfg(feature = "aws-kms")]
        KmsProviderKind::Aws => {
            let region = config
                .kms
                .aws_region
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("kms.awsRegion is required when kms.provider = aws"))?;
            Arc::new(crypto::kms::AwsKmsProvider::from_config(region).await?)
        }
        #[cfg(not(feature = "aws-kms"))]
        KmsProviderKind::Aws => {
            tracing::warn!("kms.provider = aws but this build lacks the aws-kms feature; falling back to the software provider for the hardened profile");
            Arc::new(crypto::kms::SoftwareKmsProvider::new().with_key("hardened-kek", decode_kek(software_kek)?)?)
        }
        KmsProviderKind::Software => {
            Arc::new(crypto::kms::SoftwareKmsProvider::new().with_key("hardened-kek", decode_kek(software_kek)?)?)
        }
    };

    Ok(KmsProviderMap::new(standard, hardened, "standard-kek", "hardened-kek"))
}

/// Builds every collaborator (database pool, KMS providers, repository
/// decorator stack, audit pipeline, key service, interceptor chain,
/// transport-facing service impls) from validated configuration. Does not
/// bind a listener; see [`run`].
pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<Bootstrapped> {
    let production = matches!(config.server.mode, ServerMode::Production);
    let pool = database_layer::connect(&PoolConfig {
        url: config.database.url.clone(),
        tls_enabled: config.database.tls.enabled,
        max_conns: config.database.connection.max_conns,
        min_conns: config.database.connection.min_conns,
        max_conn_idle_time: Duration::from_secs(config.database.connection.max_conn_idle_time_secs),
        max_conn_lifetime: Duration::from_secs(config.database.connection.max_conn_lifetime_secs),
        health_check_period: Duration::from_secs(config.database.connection.health_check_period_secs),
        production_mode: production,
    })
    .await?;

    let mut background_tasks = Vec::new();
    background_tasks.push(tokio::spawn(database_layer::health_check_loop(
        pool.clone(),
        Duration::from_secs(config.database.connection.health_check_period_secs),
    )));

    let retry_config = database_layer::RetryConfig {
        max_retries: config.transaction.max_retries,
        base_delay: Duration::from_millis(config.transaction.base_delay_ms),
        max_delay: Duration::from_millis(config.transaction.max_delay_ms),
    };
    let sql_repo = SqlKeyRepository::with_retry_config(pool.clone(), retry_config);
    let cached_repo = CachingKeyRepository::new(sql_repo, Duration::from_secs(config.cache.default_ttl_secs));
    let circuit_repo = CircuitBreakingKeyRepository::new(
        cached_repo,
        DbCircuitBreakerConfig {
            failure_threshold: config.circuit_breaker.max_failures,
            open_duration: Duration::from_millis(config.circuit_breaker.reset_timeout_ms),
            call_timeout: Duration::from_millis(config.circuit_breaker.call_timeout_ms),
        },
    );
    let repo: Arc<dyn KeyRepository> = Arc::new(circuit_repo);

    let kms = build_kms_providers(config).await?;

    let audit_repo = Arc::new(SqlAuditRepository::new(pool.clone()));
    let (audit_pipeline, audit_workers) = audit_engine::AuditPipeline::spawn(
        audit_repo,
        audit_engine::AuditPipelineConfig {
            channel_capacity: config.audit.channel_buffer_size,
            worker_count: config.audit.worker_count,
            batch_size: config.audit.batch_size,
            flush_interval: Duration::from_millis(config.audit.batch_timeout_ms),
        },
    );

    let key_service = Arc::new(KeyService::new(
        repo,
        kms,
        Arc::new(audit_pipeline),
        KeyServiceConfig {
            unwrap_cache_ttl: Duration::from_secs(config.cache.default_ttl_secs),
            ..KeyServiceConfig::default()
        },
    ));

    let sweep_interval = Duration::from_secs(config.cache.cleanup_interval_secs);
    let sweep_target = key_service.clone();
    background_tasks.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_target.sweep_unwrap_cache();
        }
    }));

    let private_key = config
        .bootstrap_secrets
        .jwt_rsa_private_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("bootstrapSecrets.jwtRsaPrivateKey is required"))?;
    let authenticator = Authenticator::new(private_key, Duration::from_secs(config.token_ttl_seconds))?;
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.rate, config.rate_limit.burst));
    let authorizer = Arc::new(Authorizer::new());
    let chain = Arc::new(InterceptorChain::new(authenticator.clone(), rate_limiter, authorizer));

    let clients: Arc<dyn client_store::ClientRepository> = Arc::new(SqlClientRepository::new(pool.clone()));

    let key_service_impl = grpc::KeyServiceImpl::new(key_service.clone(), chain.clone());
    let auth_service_impl = grpc::AuthServiceImpl::new(clients, authenticator, chain);

    Ok(Bootstrapped {
        key_service,
        key_service_impl,
        auth_service_impl,
        audit_workers,
        background_tasks,
    })
}

/// Binds `addr` and serves `KeyService`, `AuthService`, and the standard
/// gRPC health service until `shutdown` resolves, then drains the audit
/// pipeline before returning.
pub async fn run(
    addr: std::net::SocketAddr,
    bootstrapped: Bootstrapped,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<grpc::polykey::key_service_server::KeyServiceServer<grpc::KeyServiceImpl>>()
        .await;
    health_reporter
        .set_serving::<grpc::polykey::auth_service_server::AuthServiceServer<grpc::AuthServiceImpl>>()
        .await;

    tracing::info!(%addr, "starting polykey gRPC server");

    Server::builder()
        .layer(TraceLayer::new_for_grpc())
        .add_service(health_service)
        .add_service(grpc::polykey::key_service_server::KeyServiceServer::new(
            bootstrapped.key_service_impl,
        ))
        .add_service(grpc::polykey::auth_service_server::AuthServiceServer::new(
            bootstrapped.auth_service_impl,
        ))
        .serve_with_shutdown(addr, shutdown)
        .await?;

    tracing::info!("server stopped accepting connections, draining audit pipeline");
    for worker in bootstrapped.audit_workers {
        let _ = worker.await;
    }
    for task in bootstrapped.background_tasks {
        task.abort();
    }

    Ok(())
}
