//! Cryptographic primitives and key-management building blocks for Polykey.
//!
//! - Symmetric encryption: AES-256-GCM (`aes_gcm`), generic `Encryptor` trait (`encryption`)
//! - Envelope encryption of data encryption keys under a key-encryption key (`envelope`)
//! - Key derivation (PBKDF2 / Argon2) for password-based unlocking (`kdf`)
//! - Constant-time comparison helpers (`constant_time`)
//! - KMS provider abstraction and concrete AWS KMS / Vault Transit backends (`kms`)
//! - Secure memory handling: mlock/zeroize/guard pages (`memory_security`)
//! - Provider selection and KMS configuration (`config`)

pub mod aes_gcm;
pub mod config;
pub mod constant_time;
pub mod encryption;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod kms;
pub mod memory_security;

pub use error::{CryptoError, CryptoResult};
