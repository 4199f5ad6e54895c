//! The interceptor chain: log → authenticate → rate-limit → validate →
//! authorize → handler, fixed order, applied to every `KeyService` and
//! `AuthService` RPC except the allow-listed ones. Each stage is its own
//! small module so the chain itself (`chain::InterceptorChain`) stays a
//! thin sequencing of calls rather than a monolith.
pub mod authenticate;
pub mod authorize;
pub mod chain;
pub mod rate_limit;
pub mod validate;

pub use authenticate::{Authenticator, Claims};
pub use authorize::Authorizer;
pub use chain::InterceptorChain;
pub use rate_limit::RateLimiter;
