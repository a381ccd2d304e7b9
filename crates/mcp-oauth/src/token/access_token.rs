//! RFC 9068 JWT access tokens.
//!
//! Tokens carry `typ: at+jwt`, the resource identifier as audience, and a
//! caller-supplied `jti` that the opaque token engine uses as the storage key
//! for revocation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::jwt::{ClaimChecks, decode_unverified, expiry_after, peek_header};
use crate::AuthResult;
use crate::error::AuthError;
use crate::keys::SigningKeyManager;

/// Header `typ` of JWT access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "at+jwt";

const GENERATION_FAILED: &str = "Failed to generate JWT access token";

/// The `aud` claim, which may be a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience.
    One(String),
    /// Several audiences.
    Many(Vec<String>),
}

impl Audience {
    /// Returns `true` if `value` is one of the audiences.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(aud) => aud == value,
            Self::Many(auds) => auds.iter().any(|aud| aud == value),
        }
    }
}

/// Claims of a JWT access token.
///
/// Deserializing into this type is the shape check: tokens missing a
/// required claim or carrying a mistyped one are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer.
    pub iss: String,
    /// Subject (user ID).
    pub sub: String,
    /// Audience (resource server).
    pub aud: Audience,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Token ID, the storage key for revocation.
    pub jti: String,
    /// OAuth client ID.
    pub client_id: String,
    /// Granted scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Authorized party (client ID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    /// Resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// User profile the token acts for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile_id: Option<String>,
}

/// Input for [`JwtAccessTokenService::generate_access_token`].
#[derive(Debug, Clone)]
pub struct AccessTokenRequest {
    /// Subject.
    pub user_id: String,
    /// OAuth client ID, also emitted as `azp`.
    pub client_id: String,
    /// Granted scope.
    pub scope: Option<String>,
    /// Resource identifier, emitted as `aud` and `resource`.
    pub resource: String,
    /// User profile ID.
    pub user_profile_id: String,
    /// Token lifetime.
    pub expires_in: Duration,
    /// Token ID, emitted as `jti`.
    pub token_id: String,
    /// Issuer.
    pub issuer: String,
}

impl AccessTokenRequest {
    fn claims(&self, now: OffsetDateTime) -> Option<AccessTokenClaims> {
        let iat = now.unix_timestamp();
        Some(AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: self.user_id.clone(),
            aud: Audience::One(self.resource.clone()),
            exp: expiry_after(iat, self.expires_in)?,
            iat,
            jti: self.token_id.clone(),
            client_id: self.client_id.clone(),
            scope: self.scope.clone(),
            azp: Some(self.client_id.clone()),
            resource: Some(self.resource.clone()),
            user_profile_id: Some(self.user_profile_id.clone()),
        })
    }
}

/// Mints and validates self-contained access tokens.
#[derive(Debug, Clone)]
pub struct JwtAccessTokenService {
    keys: Arc<SigningKeyManager>,
}

impl JwtAccessTokenService {
    /// Creates the service.
    #[must_use]
    pub fn new(keys: Arc<SigningKeyManager>) -> Self {
        Self { keys }
    }

    /// Returns `true` if tokens can be signed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.keys.is_enabled()
    }

    /// Signs an access token.
    ///
    /// # Errors
    /// Returns `AuthError::TokenGeneration` with a generic message if signing
    /// is disabled, the keys cannot be loaded, or signing fails.
    pub async fn generate_access_token(&self, request: &AccessTokenRequest) -> AuthResult<String> {
        let key_pair = self.keys.signing_key_pair(false).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to generate JWT access token");
            AuthError::token_generation(GENERATION_FAILED)
        })?;

        let claims = request.claims(OffsetDateTime::now_utc()).ok_or_else(|| {
            tracing::error!(expires_in = ?request.expires_in, "Access token lifetime out of range");
            AuthError::token_generation(GENERATION_FAILED)
        })?;
        let token = key_pair.encode(ACCESS_TOKEN_TYPE, &claims).map_err(|e| {
            tracing::error!(error = %e, "Failed to generate JWT access token");
            AuthError::token_generation(GENERATION_FAILED)
        })?;

        tracing::debug!(
            user_id = %request.user_id,
            client_id = %request.client_id,
            token_id = %request.token_id,
            algorithm = %key_pair.algorithm,
            "Generated JWT access token"
        );

        Ok(token)
    }

    /// Verifies an access token.
    ///
    /// Checks the signature, algorithm, expiry, the `at+jwt` type and, when
    /// `expected_resource` is given, that it is among the audiences. Returns
    /// `None` on any failure.
    pub async fn validate_access_token(
        &self,
        token: &str,
        expected_resource: Option<&str>,
    ) -> Option<AccessTokenClaims> {
        if !self.keys.is_enabled() {
            return None;
        }

        let key_pair = match self.keys.signing_key_pair(false).await {
            Ok(key_pair) => key_pair,
            Err(e) => {
                tracing::debug!(error = %e, "JWT access token validation unavailable");
                return None;
            }
        };

        match peek_header(token) {
            Ok(header) if header.typ.as_deref().is_some_and(is_access_token_type) => {}
            Ok(header) => {
                tracing::debug!(typ = ?header.typ, "JWT access token has wrong type");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "JWT access token validation failed");
                return None;
            }
        }

        let checks = ClaimChecks {
            issuer: None,
            audience: expected_resource,
        };
        match key_pair.decode::<AccessTokenClaims>(token, &checks) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "JWT access token validation failed");
                None
            }
        }
    }

    /// Decodes an access token without verifying it.
    ///
    /// Only for inspection; never base trust decisions on the result.
    #[must_use]
    pub fn decode_access_token(&self, token: &str) -> Option<AccessTokenClaims> {
        decode_unverified(token)
            .inspect_err(|e| tracing::debug!(error = %e, "Failed to decode JWT access token"))
            .ok()
    }
}

/// Accepts `at+jwt` and its full media type form, case-insensitively.
fn is_access_token_type(typ: &str) -> bool {
    typ.eq_ignore_ascii_case(ACCESS_TOKEN_TYPE)
        || typ.eq_ignore_ascii_case("application/at+jwt")
}
