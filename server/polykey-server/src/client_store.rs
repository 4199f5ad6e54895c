//! The `Client` read model used by the authenticate stage: hashed
//! credential plus permissions and tier, loaded from an external identity
//! store. The token-issuance flow beyond its validation contract is out of
//! scope (see spec §1), so this module only supports the lookups the
//! authenticate and `AuthService` RPCs need — it is not a user-management
//! surface.
use async_trait::async_trait;
use database_layer::{Client, Tier};
use sqlx::PgPool;

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Client>>;
}

/// In-memory client store, useful for local development and tests where
/// standing up Postgres just to authenticate isn't worth it.
pub struct InMemoryClientRepository {
    clients: std::collections::HashMap<String, Client>,
}

impl InMemoryClientRepository {
    pub fn new(clients: Vec<Client>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Client>> {
        Ok(self.clients.get(id).cloned())
    }
}

/// SQL-backed client store, mirroring the `Key` repository's shape: a
/// thin adapter with no caching or circuit breaking of its own, since
/// authentication happens once per token mint rather than per request.
pub struct SqlClientRepository {
    pool: PgPool,
}

impl SqlClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ClientRow {
    id: String,
    hashed_credential: String,
    permissions: Vec<String>,
    tier: String,
}

fn parse_tier(s: &str) -> Tier {
    match s {
        "pro" => Tier::Pro,
        "enterprise" => Tier::Enterprise,
        _ => Tier::Free,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client(id: &str) -> Client {
        Client {
            id: id.to_string(),
            hashed_credential: "hash".to_string(),
            permissions: vec!["keys:read".to_string()],
            tier: Tier::Pro,
        }
    }

    #[tokio::test]
    async fn in_memory_repository_finds_known_client() {
        let repo = InMemoryClientRepository::new(vec![sample_client("client-1")]);
        let found = repo.find_by_id("client-1").await.unwrap();
        assert_eq!(found.unwrap().id, "client-1");
    }

    #[tokio::test]
    async fn in_memory_repository_returns_none_for_unknown_client() {
        let repo = InMemoryClientRepository::new(vec![sample_client("client-1")]);
        assert!(repo.find_by_id("nope").await.unwrap().is_none());
    }

    #[test]
    fn parse_tier_defaults_to_free() {
        assert_eq!(parse_tier("bogus"), Tier::Free);
        assert_eq!(parse_tier("enterprise"), Tier::Enterprise);
    }
}

#[async_trait]
impl ClientRepository for SqlClientRepository {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT id, hashed_credential, permissions, tier FROM clients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Client {
            id: r.id,
            hashed_credential: r.hashed_credential,
            permissions: r.permissions,
            tier: parse_tier(&r.tier),
        }))
    }
}
