//! Generic serializable-transaction wrapper with retry on a SQLSTATE 40001
//! conflict. Used by `RotateKey` and any other multi-statement mutation
//! that needs linearizability for a given id.
use crate::error::{DatabaseError, DatabaseResult};
use rand::Rng;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(250),
        }
    }
}

pub struct TransactionManager {
    pool: PgPool,
    retry: RetryConfig,
}

impl TransactionManager {
    pub fn new(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }

    /// Runs `work` inside a `SERIALIZABLE` transaction, retrying the whole
    /// closure on a serialization conflict up to `max_retries` times with
    /// jittered exponential backoff. Any other error aborts immediately;
    /// sqlx rolls back automatically when a `Transaction` is dropped
    /// without `commit()`.
    pub async fn run_serializable<F, Fut, T>(&self, mut work: F) -> DatabaseResult<T>
    where
        F: FnMut(Transaction<'static, Postgres>) -> Fut,
        Fut: Future<Output = DatabaseResult<(Transaction<'static, Postgres>, T)>>,
    {
        let mut attempt = 0u32;
        loop {
            let mut tx = self.pool.begin().await.map_err(DatabaseError::Sqlx)?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::Sqlx)?;

            let outcome = work(tx).await;
            match outcome {
                Ok((tx, value)) => match tx.commit().await {
                    Ok(()) => return Ok(value),
                    Err(err) => {
                        let classified = DatabaseError::from_sqlx(err);
                        if classified.is_serialization_conflict() && attempt < self.retry.max_retries
                        {
                            self.backoff(attempt).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(classified);
                    }
                },
                Err(err) => {
                    if err.is_serialization_conflict() && attempt < self.retry.max_retries {
                        self.backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let exp = self.retry.base_delay * 2u32.saturating_pow(attempt);
        let capped = exp.min(self.retry.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=(capped.as_millis() as u64 / 10).max(1));
        tokio::time::sleep(capped + Duration::from_millis(jitter_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_max_delay() {
        let cfg = RetryConfig::default();
        let exp = cfg.base_delay * 2u32.saturating_pow(10);
        assert!(exp.min(cfg.max_delay) <= cfg.max_delay);
    }
}
