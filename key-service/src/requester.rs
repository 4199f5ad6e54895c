//! The caller context attached by the authenticate interceptor stage and
//! threaded through every key-service operation.
use database_layer::Tier;

#[derive(Debug, Clone)]
pub struct RequesterContext {
    pub user_id: String,
    pub permissions: Vec<String>,
    pub tier: Tier,
}

impl RequesterContext {
    pub fn new(user_id: impl Into<String>, permissions: Vec<String>, tier: Tier) -> Self {
        Self {
            user_id: user_id.into(),
            permissions,
            tier,
        }
    }

    pub fn is_empty_identity(&self) -> bool {
        self.user_id.trim().is_empty()
    }
}
