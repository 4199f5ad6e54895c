//! Bearer-token authentication. Tokens are RS256 JWTs; this module never
//! mints them for arbitrary principals (that happens only in the
//! `AuthService::Authenticate`/`RefreshToken` RPCs) but every other RPC runs
//! its metadata through [`Authenticator::authenticate`] before anything else.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use database_layer::Tier;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tonic::metadata::MetadataMap;
use tonic::Status;

use key_service::RequesterContext;

/// Claims carried on the wire. `permissions`/`tier` are the authorization
/// inputs the downstream rate-limit and authorize stages read; `jti` backs
/// the revocation check for `AuthService::RevokeToken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub tier: String,
}

fn tier_from_claim(tier: &str) -> Tier {
    match tier {
        "pro" => Tier::Pro,
        "enterprise" => Tier::Enterprise,
        _ => Tier::Free,
    }
}

/// RS256 signing/verification plus a small in-memory revocation set. The
/// revocation set is process-local: a multi-instance deployment needs a
/// shared store behind the same trait, but that is deliberately left to the
/// deployer rather than baked in here.
pub struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    revoked_jti: RwLock<HashSet<String>>,
}

/// Full method paths that skip authentication entirely: the two RPCs whose
/// entire purpose is to hand out tokens in the first place. The standard
/// `grpc.health.v1.Health` service is served outside `KeyService`/
/// `AuthService` entirely (see `run` in the crate root) and never reaches
/// this chain, so it needs no entry here.
pub const ALLOW_LIST: &[&str] = &[
    "/polykey.v1.AuthService/Authenticate",
    "/polykey.v1.AuthService/RefreshToken",
];

impl Authenticator {
    pub fn new(private_key_pem: &str, token_ttl: Duration) -> anyhow::Result<Arc<Self>> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_key_pem))?;
        let public_key_pem = rsa::RsaPublicKey::from(&private_key).to_pkcs1_pem(Default::default())?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;

        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Arc::new(Self {
            encoding_key,
            decoding_key,
            validation,
            token_ttl,
            revoked_jti: RwLock::new(HashSet::new()),
        }))
    }

    pub fn method_is_exempt(method: &str) -> bool {
        ALLOW_LIST.contains(&method)
    }

    /// Mints a fresh token for an already-verified principal. Credential
    /// verification itself belongs to the caller (the `AuthService` RPC
    /// handler), not this module.
    pub fn mint(&self, principal: &str, permissions: Vec<String>, tier: Tier) -> Result<(String, i64), anyhow::Error> {
        let now = Utc::now().timestamp();
        let tier_str = match tier {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        };
        let claims = Claims {
            sub: principal.to_string(),
            iat: now,
            exp: now + self.token_ttl.as_secs() as i64,
            jti: uuid::Uuid::new_v4().to_string(),
            permissions,
            tier: tier_str.to_string(),
        };
        let token = encode(&Header::new(jsonwebtoken::Algorithm::RS256), &claims, &self.encoding_key)?;
        Ok((token, self.token_ttl.as_secs() as i64))
    }

    pub fn revoke(&self, jti: &str) {
        self.revoked_jti.write().insert(jti.to_string());
    }

    fn bearer_token(metadata: &MetadataMap) -> Result<&str, Status> {
        let raw = metadata
            .get("authorization")
            .ok_or_else(|| Status::unauthenticated("missing authorization metadata"))?
            .to_str()
            .map_err(|_| Status::unauthenticated("authorization metadata is not valid ASCII"))?;
        raw.strip_prefix("Bearer ")
            .ok_or_else(|| Status::unauthenticated("authorization metadata is not a bearer token"))
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, Status> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| Status::unauthenticated("invalid or expired token"))
    }

    /// Decodes a raw token (not metadata) far enough to recover its `jti`,
    /// without consulting the revocation set — used by
    /// `AuthService::RevokeToken` to revoke a token by its own value.
    pub fn jti_of(&self, token: &str) -> Result<String, Status> {
        self.decode_claims(token).map(|claims| claims.jti)
    }

    /// Recovers the principal a (still-valid, unrevoked) token was minted
    /// for — used by `AuthService::RefreshToken`, which trusts the
    /// presented token's own claims rather than requiring a separate
    /// bearer-metadata round trip.
    pub fn principal_of(&self, token: &str) -> Result<String, Status> {
        let claims = self.decode_claims(token)?;
        if self.revoked_jti.read().contains(&claims.jti) {
            return Err(Status::unauthenticated("token has been revoked"));
        }
        Ok(claims.sub)
    }

    pub fn authenticate(&self, metadata: &MetadataMap) -> Result<RequesterContext, Status> {
        let token = Self::bearer_token(metadata)?;
        let claims = self.decode_claims(token)?;

        if self.revoked_jti.read().contains(&claims.jti) {
            return Err(Status::unauthenticated("token has been revoked"));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Status::internal("clock error"))?
            .as_secs() as i64;
        if claims.exp <= now {
            return Err(Status::unauthenticated("token has expired"));
        }

        if claims.sub.trim().is_empty() {
            return Err(Status::unauthenticated("token subject is empty"));
        }

        Ok(RequesterContext::new(
            claims.sub,
            claims.permissions,
            tier_from_claim(&claims.tier),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::EncodePrivateKey;

    /// 2048 bits is the smallest size `rsa` will generate without
    /// complaining; tests only need the key to round-trip, not to be
    /// production strength.
    fn test_private_key_pem() -> String {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        key.to_pkcs8_pem(Default::default()).expect("pem encode").to_string()
    }

    fn test_authenticator() -> Arc<Authenticator> {
        Authenticator::new(&test_private_key_pem(), Duration::from_secs(900)).expect("authenticator construction")
    }

    fn metadata_with_bearer(token: &str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", format!("Bearer {token}").parse().unwrap());
        metadata
    }

    #[test]
    fn mint_and_authenticate_round_trips() {
        let auth = test_authenticator();
        let (token, ttl) = auth
            .mint("user-1", vec!["keys:read".to_string()], Tier::Pro)
            .expect("mint");
        assert_eq!(ttl, 900);

        let context = auth.authenticate(&metadata_with_bearer(&token)).expect("authenticate");
        assert_eq!(context.user_id, "user-1");
        assert_eq!(context.permissions, vec!["keys:read".to_string()]);
    }

    #[test]
    fn missing_authorization_header_is_rejected() {
        let auth = test_authenticator();
        let metadata = MetadataMap::new();
        assert!(auth.authenticate(&metadata).is_err());
    }

    #[test]
    fn revoked_token_is_rejected() {
        let auth = test_authenticator();
        let (token, _) = auth.mint("user-1", vec![], Tier::Free).expect("mint");
        let jti = auth.jti_of(&token).expect("jti");
        auth.revoke(&jti);
        assert!(auth.authenticate(&metadata_with_bearer(&token)).is_err());
    }

    #[test]
    fn token_from_different_key_pair_is_rejected() {
        let auth = test_authenticator();
        let other = test_authenticator();
        let (token, _) = other.mint("user-1", vec![], Tier::Free).expect("mint");
        assert!(auth.authenticate(&metadata_with_bearer(&token)).is_err());
    }

    #[test]
    fn method_is_exempt_matches_allow_list_only() {
        assert!(Authenticator::method_is_exempt("/polykey.v1.AuthService/Authenticate"));
        assert!(!Authenticator::method_is_exempt("/polykey.v1.KeyService/CreateKey"));
    }
}
