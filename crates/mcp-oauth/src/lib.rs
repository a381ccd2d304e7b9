//! # mcp-oauth
//!
//! Token issuance and key management core of an OAuth 2.0 / OpenID Connect
//! authorization server.
//!
//! This crate provides:
//! - ECDSA signing key management with a cached public key set
//! - OpenID Connect identity tokens
//! - RFC 9068 JWT access tokens
//! - Opaque token pairs with refresh token rotation and reuse detection
//! - JWKS and discovery endpoints
//!
//! ## Overview
//!
//! An authorization orchestrator (authorization code flow, consent, client
//! registration) calls [`OpaqueTokenService`] at grant and refresh time and
//! [`IdTokenService`] when the grant includes the `openid` scope. Both signed
//! token services pull keys from a shared [`SigningKeyManager`]. Persistence
//! is supplied by an [`OAuthTokenStore`] implementation.
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, formats, cleanup, and discovery settings
//! - [`keys`] - Signing key material, providers, and the cached key manager
//! - [`token`] - Token generation, validation, and rotation
//! - [`storage`] - Storage traits for issued tokens
//! - [`types`] - Token records and responses
//! - [`http`] - Axum handlers for the well-known endpoints
//! - [`housekeeping`] - Periodic expired token cleanup

pub mod config;
pub mod error;
pub mod housekeeping;
pub mod http;
pub mod keys;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AccessTokenFormat, ConfigError, OAuthConfig};
pub use error::{AuthError, ErrorCategory};
pub use housekeeping::spawn_cleanup_task;
pub use http::{WellKnownState, jwks_handler, well_known_router};
pub use keys::{
    EnvKeyProvider, FileKeyProvider, FnKeyProvider, SigningKeyManager, SigningKeyMaterial,
    SigningKeyProvider, StaticKeyProvider,
};
pub use storage::{ExpiredTokenCleanup, OAuthTokenStore, RefreshTokenReuseDetection};
pub use token::{
    AccessTokenClaims, AccessTokenRequest, IdTokenClaims, IdTokenRequest, IdTokenService,
    JwtAccessTokenService, OpaqueTokenService, SigningAlgorithm, TokenGrant, UserProfile,
};
pub use types::{
    TokenKind, TokenMetadata, TokenPair, TokenValidationResult, UsedRefreshToken,
};

/// Type alias for token issuance results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use mcp_oauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AccessTokenFormat, ConfigError, OAuthConfig};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::housekeeping::spawn_cleanup_task;
    pub use crate::http::{WellKnownState, well_known_router};
    pub use crate::keys::{SigningKeyManager, SigningKeyMaterial, SigningKeyProvider};
    pub use crate::storage::{ExpiredTokenCleanup, OAuthTokenStore, RefreshTokenReuseDetection};
    pub use crate::token::{
        IdTokenRequest, IdTokenService, JwtAccessTokenService, OpaqueTokenService,
        SigningAlgorithm, TokenGrant, UserProfile,
    };
    pub use crate::types::{TokenKind, TokenMetadata, TokenPair, UsedRefreshToken};
}
