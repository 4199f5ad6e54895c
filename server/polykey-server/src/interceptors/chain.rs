//! Sequences the fixed-order interceptor chain: log → authenticate →
//! rate-limit. `validate` and `authorize` are operation-specific (their
//! rules depend on the request shape and the operation being performed) and
//! are invoked inline by each gRPC handler once it has decoded its request,
//! rather than threaded through here uniformly.
use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::Status;

use key_service::RequesterContext;

use super::authenticate::Authenticator;
use super::authorize::Authorizer;
use super::rate_limit::RateLimiter;

pub struct InterceptorChain {
    authenticator: Arc<Authenticator>,
    rate_limiter: Arc<RateLimiter>,
    authorizer: Arc<Authorizer>,
}

impl InterceptorChain {
    pub fn new(authenticator: Arc<Authenticator>, rate_limiter: Arc<RateLimiter>, authorizer: Arc<Authorizer>) -> Self {
        Self {
            authenticator,
            rate_limiter,
            authorizer,
        }
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    /// Runs log → authenticate → rate-limit for `method` (a full gRPC method
    /// path, e.g. `/polykey.v1.KeyService/CreateKey`) and returns the
    /// resulting requester context. Allow-listed methods skip authentication
    /// and rate limiting entirely.
    #[tracing::instrument(skip(self, metadata), fields(method = %method))]
    pub fn enter(&self, metadata: &MetadataMap, method: &str) -> Result<RequesterContext, Status> {
        tracing::debug!("request received");

        if Authenticator::method_is_exempt(method) {
            return Ok(RequesterContext::new(String::new(), Vec::new(), database_layer::Tier::Free));
        }

        let context = self.authenticator.authenticate(metadata)?;
        self.rate_limiter.check(&context.user_id)?;
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptors::rate_limit::RateLimiter;
    use rsa::pkcs8::EncodePrivateKey;
    use rsa::RsaPrivateKey;
    use std::time::Duration;

    fn test_chain() -> (InterceptorChain, Arc<Authenticator>) {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let pem = key.to_pkcs8_pem(Default::default()).expect("pem encode").to_string();
        let authenticator = Authenticator::new(&pem, Duration::from_secs(900)).expect("authenticator");
        let rate_limiter = Arc::new(RateLimiter::new(100, 100));
        let authorizer = Arc::new(Authorizer::new());
        (
            InterceptorChain::new(authenticator.clone(), rate_limiter, authorizer),
            authenticator,
        )
    }

    #[test]
    fn exempt_method_skips_authentication() {
        let (chain, _authenticator) = test_chain();
        let metadata = MetadataMap::new();
        let context = chain
            .enter(&metadata, "/polykey.v1.AuthService/Authenticate")
            .expect("exempt method should not require a token");
        assert!(context.is_empty_identity());
    }

    #[test]
    fn non_exempt_method_requires_a_token() {
        let (chain, _authenticator) = test_chain();
        let metadata = MetadataMap::new();
        assert!(chain.enter(&metadata, "/polykey.v1.KeyService/CreateKey").is_err());
    }

    #[test]
    fn non_exempt_method_accepts_a_valid_token() {
        let (chain, authenticator) = test_chain();
        let (token, _) = authenticator.mint("user-1", vec![], database_layer::Tier::Free).expect("mint");
        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", format!("Bearer {token}").parse().unwrap());
        let context = chain.enter(&metadata, "/polykey.v1.KeyService/CreateKey").expect("authenticate");
        assert_eq!(context.user_id, "user-1");
    }
}
