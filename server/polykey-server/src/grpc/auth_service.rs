//! `AuthService`: validates a principal's credential against the client
//! store and mints/refreshes/revokes bearer tokens. Credential issuance
//! itself (provisioning a client, rotating its hashed credential) is out of
//! scope — this is the validation contract only.
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use tonic::{Request, Response, Status};

use crate::client_store::ClientRepository;
use crate::interceptors::{Authenticator, InterceptorChain};

use super::polykey::{self, auth_service_server::AuthService as AuthServiceTrait};

pub struct AuthServiceImpl {
    clients: Arc<dyn ClientRepository>,
    authenticator: Arc<Authenticator>,
    chain: Arc<InterceptorChain>,
}

impl AuthServiceImpl {
    pub fn new(clients: Arc<dyn ClientRepository>, authenticator: Arc<Authenticator>, chain: Arc<InterceptorChain>) -> Self {
        Self {
            clients,
            authenticator,
            chain,
        }
    }

    fn verify_credential(hashed: &str, supplied: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        Argon2::default().verify_password(supplied.as_bytes(), &parsed).is_ok()
    }
}

#[tonic::async_trait]
impl AuthServiceTrait for AuthServiceImpl {
    async fn authenticate(
        &self,
        request: Request<polykey::AuthenticateRequest>,
    ) -> Result<Response<polykey::AuthenticateResponse>, Status> {
        self.chain
            .enter(request.metadata(), "/polykey.v1.AuthService/Authenticate")?;
        let req = request.into_inner();

        let client = self
            .clients
            .find_by_id(&req.principal)
            .await
            .map_err(|err| Status::internal(err.to_string()))?
            .ok_or_else(|| Status::unauthenticated("unknown principal"))?;

        if !Self::verify_credential(&client.hashed_credential, &req.credential) {
            return Err(Status::unauthenticated("invalid credential"));
        }

        let (token, ttl_seconds) = self
            .authenticator
            .mint(&client.id, client.permissions.clone(), client.tier)
            .map_err(|_| Status::internal("token minting failed"))?;

        Ok(Response::new(polykey::AuthenticateResponse { token, ttl_seconds }))
    }

    async fn refresh_token(
        &self,
        request: Request<polykey::RefreshTokenRequest>,
    ) -> Result<Response<polykey::RefreshTokenResponse>, Status> {
        self.chain
            .enter(request.metadata(), "/polykey.v1.AuthService/RefreshToken")?;
        let req = request.into_inner();

        let principal = self.authenticator.principal_of(&req.refresh_token)?;
        let client = self
            .clients
            .find_by_id(&principal)
            .await
            .map_err(|err| Status::internal(err.to_string()))?
            .ok_or_else(|| Status::unauthenticated("unknown principal"))?;

        let (token, ttl_seconds) = self
            .authenticator
            .mint(&client.id, client.permissions.clone(), client.tier)
            .map_err(|_| Status::internal("token minting failed"))?;

        Ok(Response::new(polykey::RefreshTokenResponse { token, ttl_seconds }))
    }

    async fn revoke_token(
        &self,
        request: Request<polykey::RevokeTokenRequest>,
    ) -> Result<Response<polykey::RevokeTokenResponse>, Status> {
        self.chain
            .enter(request.metadata(), "/polykey.v1.AuthService/RevokeToken")?;
        let req = request.into_inner();

        let jti = self.authenticator.jti_of(&req.token)?;
        self.authenticator.revoke(&jti);

        Ok(Response::new(polykey::RevokeTokenResponse {}))
    }
}
