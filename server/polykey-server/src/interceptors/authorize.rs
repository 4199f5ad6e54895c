//! Tier-based authorization. Storage profile is otherwise derived
//! deterministically from tier ([`Tier::storage_profile`]), so the only
//! place a client can reach for a profile their tier doesn't grant is by
//! requesting `DataClassification::Secret` on `CreateKey`/`BatchCreateKeys`
//! — that classification signals intent for the hardened profile, and a
//! free-tier (or unrecognized-tier) principal requesting it is denied
//! outright rather than silently downgraded to the standard profile.
use database_layer::{DataClassification, StorageProfile, Tier};
use tonic::Status;

pub struct Authorizer;

impl Authorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn check_create(&self, tier: Tier, classification: DataClassification) -> Result<(), Status> {
        if classification == DataClassification::Secret && tier.storage_profile() != StorageProfile::Hardened {
            return Err(Status::permission_denied(
                "the current tier does not grant access to the hardened storage profile",
            ));
        }
        Ok(())
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_denied_for_secret_classification() {
        let authorizer = Authorizer::new();
        assert!(authorizer.check_create(Tier::Free, DataClassification::Secret).is_err());
    }

    #[test]
    fn pro_tier_allowed_for_secret_classification() {
        let authorizer = Authorizer::new();
        assert!(authorizer.check_create(Tier::Pro, DataClassification::Secret).is_ok());
    }

    #[test]
    fn free_tier_allowed_for_public_classification() {
        let authorizer = Authorizer::new();
        assert!(authorizer.check_create(Tier::Free, DataClassification::Public).is_ok());
    }
}
