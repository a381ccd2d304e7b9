//! In-memory token storage backend for `mcp-oauth`.
//!
//! This crate provides an implementation of [`OAuthTokenStore`] with both
//! optional capabilities (refresh token reuse detection and expired token
//! cleanup), using `DashMap` for concurrent access. Suitable for single
//! instance deployments and tests; nothing survives a restart.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mcp_oauth::{OAuthConfig, OpaqueTokenService, SigningKeyManager, TokenGrant};
//! use mcp_oauth_memory::InMemoryOAuthStore;
//!
//! let store = Arc::new(InMemoryOAuthStore::new());
//! let service = OpaqueTokenService::new(&OAuthConfig::default(), keys, store);
//!
//! let pair = service
//!     .generate_token_pair(&TokenGrant::new("u1", "c1", "openid", "r1", "p1"))
//!     .await?;
//! ```

pub mod store;

pub use mcp_oauth::storage::OAuthTokenStore;
pub use store::InMemoryOAuthStore;

/// Type alias for a shareable token store instance.
pub type DynTokenStore = std::sync::Arc<dyn OAuthTokenStore>;

/// Creates a new in-memory token store.
pub fn create_token_store() -> DynTokenStore {
    std::sync::Arc::new(InMemoryOAuthStore::new())
}
