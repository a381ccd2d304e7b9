//! Signing key management.
//!
//! - [`material`] - Key material shape, validation, and key ID derivation
//! - [`provider`] - Sources of key material (static, environment, files, closures)
//! - [`manager`] - Cached, atomically replaced key state and JWKS

pub mod manager;
pub mod material;
pub mod provider;

pub use manager::{DEFAULT_KEY_CACHE_TTL, SigningKeyManager, is_stale};
pub use material::{MAX_KEY_ID_LENGTH, SigningKeyMaterial, generate_key_id, validate_key_id};
pub use provider::{
    EnvKeyProvider, FileKeyProvider, FnKeyProvider, SigningKeyProvider, StaticKeyProvider,
};
