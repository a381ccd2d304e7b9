//! Storage traits for issued tokens.
//!
//! This module defines the storage interface for:
//!
//! - Access and refresh token records
//! - Refresh token reuse detection (optional)
//! - Expired token cleanup (optional)
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `mcp-oauth-memory` - In-memory storage backend

pub mod token_store;

pub use token_store::{ExpiredTokenCleanup, OAuthTokenStore, RefreshTokenReuseDetection};
