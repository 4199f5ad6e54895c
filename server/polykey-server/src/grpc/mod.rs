//! Generated protobuf types plus the two service implementations that sit
//! directly on top of them. Health checking is served separately by
//! `tonic-health`'s standard `grpc.health.v1.Health` service, wired in
//! `main.rs` rather than generated here.
pub mod auth_service;
pub mod convert;
pub mod key_service;

/// The `tonic-build` output for `polykey.v1`. Kept in its own module so the
/// generated code's naming (snake_case field accessors, `*Request`/
/// `*Response` suffixes) never leaks stylistic choices into the rest of the
/// crate.
pub mod polykey {
    tonic::include_proto!("polykey.v1");
}

pub use auth_service::AuthServiceImpl;
pub use key_service::KeyServiceImpl;
