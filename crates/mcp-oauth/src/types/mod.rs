//! Common types used across the token issuance modules.
//!
//! ## Domain Types
//!
//! - [`TokenMetadata`] - Stored record of an issued access or refresh token
//! - [`UsedRefreshToken`] - Marker left by a consumed refresh token
//! - [`TokenPair`] - Token response handed to the orchestrator

pub mod token;

pub use token::{
    TOKEN_BYTES, TokenKind, TokenMetadata, TokenPair, TokenValidationResult, UsedRefreshToken,
    generate_secure_token, token_prefix,
};
