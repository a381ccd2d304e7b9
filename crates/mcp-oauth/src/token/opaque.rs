//! Token pair issuance, refresh token rotation, and revocation.
//!
//! # Usage
//!
//! ```ignore
//! use mcp_oauth::token::{OpaqueTokenService, TokenGrant};
//!
//! let service = OpaqueTokenService::new(&config, keys, store);
//!
//! let pair = service
//!     .generate_token_pair(&TokenGrant::new("u1", "c1", "openid offline_access", "r1", "p1"))
//!     .await?;
//!
//! let rotated = service
//!     .refresh_access_token(&pair.refresh_token, "c1", Some("openid"))
//!     .await?;
//! ```
//!
//! # Rotation
//!
//! Every refresh token is single use. Redeeming one issues a new pair in the
//! same family at `generation + 1`. When the store supports reuse detection,
//! presenting an already redeemed refresh token revokes the whole family.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use super::access_token::{AccessTokenRequest, JwtAccessTokenService};
use super::scope::narrow_scope;
use crate::AuthResult;
use crate::config::{AccessTokenFormat, OAuthConfig};
use crate::error::AuthError;
use crate::keys::SigningKeyManager;
use crate::storage::OAuthTokenStore;
use crate::types::token::{
    TokenKind, TokenMetadata, TokenPair, TokenValidationResult, generate_secure_token,
    token_prefix,
};

/// Prefix of token family identifiers.
pub const FAMILY_ID_PREFIX: &str = "tkfam_";

/// Prefix of JWT access token identifiers.
pub const JTI_PREFIX: &str = "jti_";

/// Input for [`OpaqueTokenService::generate_token_pair`].
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub user_id: String,
    pub client_id: String,
    pub scope: String,
    pub resource: String,
    pub user_profile_id: String,
    /// Data carried on every record of the family.
    pub user_data: Option<serde_json::Value>,
    /// Existing family to continue; a new family is started when `None`.
    pub family_id: Option<String>,
    pub generation: u32,
}

impl TokenGrant {
    /// Creates a grant that starts a new family at generation 0.
    pub fn new(
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        scope: impl Into<String>,
        resource: impl Into<String>,
        user_profile_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: client_id.into(),
            scope: scope.into(),
            resource: resource.into(),
            user_profile_id: user_profile_id.into(),
            user_data: None,
            family_id: None,
            generation: 0,
        }
    }

    /// Attaches embedding-server data.
    #[must_use]
    pub fn with_user_data(mut self, user_data: serde_json::Value) -> Self {
        self.user_data = Some(user_data);
        self
    }

    /// Continues an existing family at the given generation.
    #[must_use]
    pub fn in_family(mut self, family_id: impl Into<String>, generation: u32) -> Self {
        self.family_id = Some(family_id.into());
        self.generation = generation;
        self
    }

    /// Builds the grant for the next rotation of a refresh token record.
    fn rotation_of(metadata: &TokenMetadata, scope: String) -> Self {
        Self {
            user_id: metadata.user_id.clone(),
            client_id: metadata.client_id.clone(),
            scope,
            resource: metadata.resource.clone(),
            user_profile_id: metadata.user_profile_id.clone(),
            user_data: metadata.user_data.clone(),
            family_id: Some(metadata.family_id.clone()),
            generation: metadata.generation.saturating_add(1),
        }
    }
}

/// Issues, rotates, validates, and revokes tokens backed by a store.
pub struct OpaqueTokenService {
    config: OAuthConfig,
    store: Arc<dyn OAuthTokenStore>,
    access_tokens: JwtAccessTokenService,
}

impl OpaqueTokenService {
    /// Creates the engine.
    ///
    /// The signing key manager is only used when the configured access
    /// token format is [`AccessTokenFormat::Jwt`].
    pub fn new(
        config: &OAuthConfig,
        keys: Arc<SigningKeyManager>,
        store: Arc<dyn OAuthTokenStore>,
    ) -> Self {
        Self {
            config: config.clone(),
            store,
            access_tokens: JwtAccessTokenService::new(keys),
        }
    }

    /// Returns the configured access token format.
    #[must_use]
    pub fn access_token_format(&self) -> AccessTokenFormat {
        self.config.access_token_format
    }

    /// Returns the format actually used for new and presented access tokens.
    ///
    /// JWT access tokens need a signing key; with signing disabled the engine
    /// falls back to opaque tokens.
    #[must_use]
    pub fn effective_access_token_format(&self) -> AccessTokenFormat {
        match self.config.access_token_format {
            AccessTokenFormat::Jwt if self.access_tokens.is_enabled() => AccessTokenFormat::Jwt,
            _ => AccessTokenFormat::Opaque,
        }
    }

    /// Issues an access and refresh token pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenGeneration` if a JWT access token cannot be
    /// signed or a configured lifetime is out of range, or a storage error if
    /// a record cannot be written.
    pub async fn generate_token_pair(&self, grant: &TokenGrant) -> AuthResult<TokenPair> {
        let now = OffsetDateTime::now_utc();
        let access_lifetime = self.config.tokens.access_token_lifetime;
        let refresh_expires_at =
            expires_after(now, self.config.tokens.refresh_token_lifetime)?;

        let family_id = grant.family_id.clone().unwrap_or_else(new_family_id);
        let access_metadata = TokenMetadata {
            user_id: grant.user_id.clone(),
            client_id: grant.client_id.clone(),
            scope: grant.scope.clone(),
            resource: grant.resource.clone(),
            user_profile_id: grant.user_profile_id.clone(),
            expires_at: expires_after(now, access_lifetime)?,
            family_id,
            generation: grant.generation,
            used_at: None,
            user_data: grant.user_data.clone(),
        };

        let format = self.effective_access_token_format();
        let access_token = match format {
            AccessTokenFormat::Jwt => {
                let jti = format!("{}{}", JTI_PREFIX, Uuid::new_v4());
                let request = AccessTokenRequest {
                    user_id: grant.user_id.clone(),
                    client_id: grant.client_id.clone(),
                    scope: (!grant.scope.trim().is_empty()).then(|| grant.scope.clone()),
                    resource: grant.resource.clone(),
                    user_profile_id: grant.user_profile_id.clone(),
                    expires_in: access_lifetime,
                    token_id: jti.clone(),
                    issuer: self.config.server_url.clone(),
                };
                let token = self.access_tokens.generate_access_token(&request).await?;
                self.store.store_access_token(&jti, &access_metadata).await?;
                token
            }
            AccessTokenFormat::Opaque => {
                let token = generate_secure_token();
                self.store
                    .store_access_token(&token, &access_metadata)
                    .await?;
                token
            }
        };

        let refresh_token = generate_secure_token();
        let refresh_metadata = TokenMetadata {
            expires_at: refresh_expires_at,
            ..access_metadata
        };
        self.store
            .store_refresh_token(&refresh_token, &refresh_metadata)
            .await?;

        tracing::info!(
            user_id = %grant.user_id,
            client_id = %grant.client_id,
            family_id = %refresh_metadata.family_id,
            generation = refresh_metadata.generation,
            format = format.as_str(),
            "Issued token pair"
        );

        Ok(TokenPair::bearer(
            access_token,
            refresh_token,
            access_lifetime.as_secs(),
            grant.scope.clone(),
        ))
    }

    /// Validates an access token.
    ///
    /// JWT access tokens must verify, be issued for the configured resource,
    /// and still have a live record under their `jti`; deleting that record
    /// is how they are revoked. Opaque
    /// tokens are looked up directly. Expired records are removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    pub async fn validate_access_token(
        &self,
        token: &str,
    ) -> AuthResult<Option<TokenValidationResult>> {
        let id = match self.effective_access_token_format() {
            AccessTokenFormat::Jwt => {
                match self
                    .access_tokens
                    .validate_access_token(token, Some(&self.config.resource))
                    .await
                {
                    Some(claims) => claims.jti,
                    None => return Ok(None),
                }
            }
            AccessTokenFormat::Opaque => token.to_string(),
        };

        let Some(metadata) = self.store.get_access_token(&id).await? else {
            tracing::debug!(token = token_prefix(&id), "Access token not found");
            return Ok(None);
        };

        if metadata.is_expired() {
            tracing::debug!(token = token_prefix(&id), "Access token expired");
            self.store.remove_access_token(&id).await?;
            return Ok(None);
        }

        Ok(Some(metadata.into()))
    }

    /// Looks up a refresh token, removing it if expired.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    pub async fn validate_refresh_token(&self, token: &str) -> AuthResult<Option<TokenMetadata>> {
        let Some(metadata) = self.store.get_refresh_token(token).await? else {
            tracing::debug!(token = token_prefix(token), "Refresh token not found");
            return Ok(None);
        };

        if metadata.is_expired() {
            tracing::debug!(token = token_prefix(token), "Refresh token expired");
            self.store.remove_refresh_token(token).await?;
            return Ok(None);
        }

        Ok(Some(metadata))
    }

    /// Redeems a refresh token for a new token pair.
    ///
    /// Returns `Ok(None)` when the token is unknown, expired, already
    /// redeemed, issued to another client, or when the requested scope is
    /// not a subset of the original grant. A redeemed token presented again
    /// revokes its whole family.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the new pair cannot be issued.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        requested_scope: Option<&str>,
    ) -> AuthResult<Option<TokenPair>> {
        let reuse_detection = self.store.reuse_detection();

        if let Some(reuse) = reuse_detection
            && let Some(used) = reuse.find_used_refresh_token(refresh_token).await?
        {
            let revoked = reuse.revoke_token_family(&used.family_id).await?;
            tracing::error!(
                security = true,
                token = token_prefix(refresh_token),
                family_id = %used.family_id,
                generation = used.generation,
                revoked,
                "Refresh token reuse detected, token family revoked"
            );
            return Ok(None);
        }

        let Some(metadata) = self.validate_refresh_token(refresh_token).await? else {
            return Ok(None);
        };

        if metadata.client_id != client_id {
            tracing::warn!(
                token = token_prefix(refresh_token),
                expected_client_id = %metadata.client_id,
                client_id = %client_id,
                "Refresh token presented by a different client"
            );
            return Ok(None);
        }

        let scope = match narrow_scope(&metadata.scope, requested_scope) {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!(
                    token = token_prefix(refresh_token),
                    error = %e,
                    "Refresh rejected"
                );
                return Ok(None);
            }
        };

        if let Some(reuse) = reuse_detection
            && !reuse
                .mark_refresh_token_as_used(refresh_token, &metadata)
                .await?
        {
            let revoked = reuse.revoke_token_family(&metadata.family_id).await?;
            tracing::error!(
                security = true,
                token = token_prefix(refresh_token),
                family_id = %metadata.family_id,
                revoked,
                "Concurrent refresh token redemption, token family revoked"
            );
            return Ok(None);
        }
        self.store.remove_refresh_token(refresh_token).await?;

        let grant = TokenGrant::rotation_of(&metadata, scope);
        let pair = self.generate_token_pair(&grant).await?;

        tracing::debug!(
            family_id = %metadata.family_id,
            generation = grant.generation,
            "Rotated refresh token"
        );

        Ok(Some(pair))
    }

    /// Revokes a single token.
    ///
    /// For JWT access tokens the record under the token's `jti` is removed.
    /// Returns `false` if the store failed; revoking an unknown token
    /// succeeds.
    pub async fn revoke_token(&self, token: &str, kind: TokenKind) -> bool {
        let result = match kind {
            TokenKind::Access => {
                let id = self.access_token_id(token);
                self.store.remove_access_token(&id).await
            }
            TokenKind::Refresh => self.store.remove_refresh_token(token).await,
        };

        match result {
            Ok(()) => {
                tracing::debug!(token = token_prefix(token), kind = %kind, "Token revoked");
                true
            }
            Err(e) => {
                tracing::warn!(
                    token = token_prefix(token),
                    kind = %kind,
                    error = %e,
                    category = %e.category(),
                    "Token revocation failed"
                );
                false
            }
        }
    }

    /// Purges tokens expired longer than the configured retention.
    ///
    /// Returns the number of removed records, or 0 when the store does not
    /// support cleanup or the cleanup failed.
    pub async fn cleanup_expired_tokens(&self) -> u64 {
        let Some(cleanup) = self.store.expired_token_cleanup() else {
            tracing::debug!("Token store does not support expired token cleanup");
            return 0;
        };

        let retention_days = self.config.cleanup.retention_days();
        match cleanup.cleanup_expired_tokens(retention_days).await {
            Ok(removed) => {
                tracing::info!(removed, retention_days, "Expired tokens cleaned up");
                removed
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    category = %e.category(),
                    "Expired token cleanup failed"
                );
                0
            }
        }
    }

    /// Resolves the storage key of an access token.
    fn access_token_id(&self, token: &str) -> String {
        if self.effective_access_token_format() == AccessTokenFormat::Jwt
            && let Some(claims) = self.access_tokens.decode_access_token(token)
        {
            return claims.jti;
        }
        token.to_string()
    }
}

impl std::fmt::Debug for OpaqueTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueTokenService")
            .field("access_token_format", &self.effective_access_token_format())
            .finish_non_exhaustive()
    }
}

fn expires_after(now: OffsetDateTime, lifetime: Duration) -> AuthResult<OffsetDateTime> {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .ok_or_else(|| AuthError::token_generation("Token lifetime out of range"))
}

fn new_family_id() -> String {
    format!("{}{}", FAMILY_ID_PREFIX, Uuid::new_v4())
}
