//! Token generation, validation, and management.
//!
//! This module provides:
//!
//! - JWS encoding and decoding for ES256, ES384, and ES512
//! - OpenID Connect identity tokens
//! - RFC 9068 JWT access tokens
//! - Opaque token pairs with refresh token rotation and reuse detection
//! - Scope narrowing on refresh

pub mod access_token;
pub mod id_token;
pub mod jwt;
pub mod opaque;
pub mod scope;

pub use access_token::{
    ACCESS_TOKEN_TYPE, AccessTokenClaims, AccessTokenRequest, Audience, JwtAccessTokenService,
};
pub use id_token::{IdTokenClaims, IdTokenRequest, IdTokenService, UserProfile};
pub use jwt::{Jwk, Jwks, JwtError, SigningAlgorithm, SigningKeyPair};
pub use opaque::{FAMILY_ID_PREFIX, JTI_PREFIX, OpaqueTokenService, TokenGrant};
pub use scope::{has_scope, narrow_scope};
