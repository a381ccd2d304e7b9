//! Token storage traits.
//!
//! This module defines the storage interface consumed by the opaque token
//! engine. The core trait covers access and refresh token records; refresh
//! token reuse detection and expired token cleanup are optional capabilities
//! a store advertises through accessor methods.
//!
//! # Security Considerations
//!
//! - Marking a refresh token as used must be an atomic check-and-set
//! - Family revocation must remove every record sharing the family id
//! - Lookups must not return expired records as valid; the engine checks
//!   `expires_at` but stores may also evict lazily
//!
//! # Implementation Notes
//!
//! Capabilities are discovered with [`OAuthTokenStore::reuse_detection`] and
//! [`OAuthTokenStore::expired_token_cleanup`]. A store that supports a
//! capability implements the extension trait and returns `Some(self)`.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::token::{TokenMetadata, UsedRefreshToken};

/// Storage trait for issued tokens.
///
/// Access token records are keyed by the opaque token value, or by the
/// `jti` for JWT access tokens. Refresh token records are keyed by the token
/// value.
///
/// # Implementations
///
/// Implementations are provided in separate crates:
/// - `mcp-oauth-memory` - In-memory storage backend
///
/// # Example Implementation
///
/// ```ignore
/// use mcp_oauth::storage::{OAuthTokenStore, ExpiredTokenCleanup};
/// use mcp_oauth::AuthResult;
///
/// struct MyStore { /* ... */ }
///
/// #[async_trait::async_trait]
/// impl OAuthTokenStore for MyStore {
///     // ... required methods
///
///     fn expired_token_cleanup(&self) -> Option<&dyn ExpiredTokenCleanup> {
///         Some(self)
///     }
/// }
/// ```
#[async_trait]
pub trait OAuthTokenStore: Send + Sync {
    /// Stores an access token record.
    ///
    /// # Arguments
    ///
    /// * `id` - Opaque token value or JWT `jti`
    /// * `metadata` - Record to store
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn store_access_token(&self, id: &str, metadata: &TokenMetadata) -> AuthResult<()>;

    /// Finds an access token record.
    ///
    /// # Returns
    ///
    /// Returns `Some(metadata)` if found, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_access_token(&self, id: &str) -> AuthResult<Option<TokenMetadata>>;

    /// Removes an access token record. Removing an unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove_access_token(&self, id: &str) -> AuthResult<()>;

    /// Stores a refresh token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn store_refresh_token(&self, token: &str, metadata: &TokenMetadata) -> AuthResult<()>;

    /// Finds a refresh token record.
    ///
    /// # Returns
    ///
    /// Returns `Some(metadata)` if found, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_refresh_token(&self, token: &str) -> AuthResult<Option<TokenMetadata>>;

    /// Removes a refresh token record. Removing an unknown token is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove_refresh_token(&self, token: &str) -> AuthResult<()>;

    /// Returns the reuse detection capability, if supported.
    fn reuse_detection(&self) -> Option<&dyn RefreshTokenReuseDetection> {
        None
    }

    /// Returns the expired token cleanup capability, if supported.
    fn expired_token_cleanup(&self) -> Option<&dyn ExpiredTokenCleanup> {
        None
    }
}

/// Refresh token reuse detection.
///
/// Consumed refresh tokens leave a [`UsedRefreshToken`] marker behind so
/// that presenting one again can be traced to its family and the whole
/// family revoked.
#[async_trait]
pub trait RefreshTokenReuseDetection: Send + Sync {
    /// Checks whether a refresh token has already been consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_refresh_token_used(&self, token: &str) -> AuthResult<bool> {
        Ok(self.find_used_refresh_token(token).await?.is_some())
    }

    /// Finds the marker of a consumed refresh token.
    ///
    /// # Returns
    ///
    /// Returns `Some(marker)` if the token was consumed, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_used_refresh_token(&self, token: &str) -> AuthResult<Option<UsedRefreshToken>>;

    /// Atomically marks a refresh token as consumed.
    ///
    /// # Arguments
    ///
    /// * `token` - The refresh token value
    /// * `metadata` - The token's record, used to build the marker
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The token was not consumed before and is now marked
    /// * `Ok(false)` - The token was already consumed
    ///
    /// # Atomicity
    ///
    /// Two concurrent calls for the same token must not both return `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_refresh_token_as_used(
        &self,
        token: &str,
        metadata: &TokenMetadata,
    ) -> AuthResult<bool>;

    /// Removes every access and refresh token of a family.
    ///
    /// Used markers are kept so that later replays are still recognized.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_token_family(&self, family_id: &str) -> AuthResult<u64>;
}

/// Expired token cleanup.
#[async_trait]
pub trait ExpiredTokenCleanup: Send + Sync {
    /// Purges records that expired more than `older_than_days` days ago.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired_tokens(&self, older_than_days: u32) -> AuthResult<u64>;
}
