//! Bounded Postgres connection pool. TLS is mandatory whenever
//! `server.mode = production`; the pool fails closed on exhaustion rather
//! than queuing indefinitely.
use crate::error::{DatabaseError, DatabaseResult};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub tls_enabled: bool,
    pub max_conns: u32,
    pub min_conns: u32,
    pub max_conn_idle_time: Duration,
    pub max_conn_lifetime: Duration,
    pub health_check_period: Duration,
    pub production_mode: bool,
}

pub async fn connect(config: &PoolConfig) -> DatabaseResult<PgPool> {
    let mut options = PgConnectOptions::from_str(&config.url).map_err(DatabaseError::Sqlx)?;

    let ssl_mode = if config.tls_enabled || config.production_mode {
        PgSslMode::Require
    } else {
        PgSslMode::Prefer
    };
    options = options.ssl_mode(ssl_mode);

    if config.production_mode && !config.tls_enabled {
        tracing::warn!("production mode without explicit database.tls.enabled; forcing TLS");
    }

    PgPoolOptions::new()
        .max_connections(config.max_conns)
        .min_connections(config.min_conns)
        .idle_timeout(Some(config.max_conn_idle_time))
        .max_lifetime(Some(config.max_conn_lifetime))
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
        .map_err(DatabaseError::Sqlx)
}

/// Periodic health check task; an unhealthy pool is logged, not panicked on
/// — callers observe failures through the circuit breaker instead.
pub async fn health_check_loop(pool: PgPool, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if let Err(err) = sqlx::query("SELECT 1").execute(&pool).await {
            tracing::warn!(error = %err, "database health check failed");
        }
    }
}
