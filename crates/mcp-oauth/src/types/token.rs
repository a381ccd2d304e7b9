//! Opaque token domain types.
//!
//! This module defines the records persisted for issued access and refresh
//! tokens and the response artifact handed back to the orchestrator.
//!
//! # Security
//!
//! - Token values are 64 random bytes, base64url encoded
//! - Refresh tokens are single use; consumed tokens are remembered by the
//!   store so replays can be detected
//! - Token values are only ever logged by prefix

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Number of random bytes in an opaque token.
pub const TOKEN_BYTES: usize = 64;

/// Number of leading characters of a token value that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

/// Metadata stored for an issued access or refresh token.
///
/// The token value itself is the storage key and is not part of the record.
/// For JWT access tokens the key is the token's `jti`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    /// User the token was issued to.
    pub user_id: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Protected resource identifier.
    pub resource: String,

    /// User profile the token acts for.
    pub user_profile_id: String,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Lineage shared by every token descended from the same grant.
    pub family_id: String,

    /// Rotation count within the family, starting at 0.
    pub generation: u32,

    /// When a refresh token was consumed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub used_at: Option<OffsetDateTime>,

    /// Opaque data attached by the embedding server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
}

impl TokenMetadata {
    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    /// Returns `true` if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Returns `true` if this refresh token has been consumed.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Marker left behind by a consumed refresh token.
///
/// Rotation removes the token's record, so the marker is what lets a later
/// replay be traced back to its family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedRefreshToken {
    /// Family of the consumed token.
    pub family_id: String,

    /// Generation of the consumed token.
    pub generation: u32,

    /// When the token was consumed.
    #[serde(with = "time::serde::rfc3339")]
    pub used_at: OffsetDateTime,

    /// When the consumed token would have expired.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Token response returned to the orchestrator.
///
/// Serializes as an OAuth 2.0 token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenPair {
    /// Creates a bearer token pair without an identity token.
    #[must_use]
    pub fn bearer(
        access_token: String,
        refresh_token: String,
        expires_in: u64,
        scope: String,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            id_token: None,
        }
    }

    /// Attaches an identity token.
    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }
}

/// Result of a successful access token validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenValidationResult {
    pub user_id: String,
    pub client_id: String,
    pub scope: String,
    pub resource: String,
    pub user_profile_id: String,
    pub user_data: Option<serde_json::Value>,
}

impl From<TokenMetadata> for TokenValidationResult {
    fn from(metadata: TokenMetadata) -> Self {
        Self {
            user_id: metadata.user_id,
            client_id: metadata.client_id,
            scope: metadata.scope,
            resource: metadata.resource,
            user_profile_id: metadata.user_profile_id,
            user_data: metadata.user_data,
        }
    }
}

/// Kind of token being revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Returns the RFC 7009 token type hint for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generates a cryptographically secure random token.
///
/// Returns 64 random bytes encoded as base64url without padding
/// (86 characters).
#[must_use]
pub fn generate_secure_token() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use rand::RngCore;

    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Returns the part of a token value that is safe to log.
#[must_use]
pub fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(LOG_PREFIX_LEN) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn metadata(expires_at: OffsetDateTime) -> TokenMetadata {
        TokenMetadata {
            user_id: "u1".to_string(),
            client_id: "c1".to_string(),
            scope: "openid".to_string(),
            resource: "r1".to_string(),
            user_profile_id: "p1".to_string(),
            expires_at,
            family_id: "tkfam_1".to_string(),
            generation: 0,
            used_at: None,
            user_data: None,
        }
    }

    #[test]
    fn test_generate_secure_token() {
        let token = generate_secure_token();

        // 64 bytes base64url encoded = 86 characters
        assert_eq!(token.len(), 86);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_secure_token());
    }

    #[test]
    fn test_token_prefix() {
        assert_eq!(token_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(token_prefix("abc"), "abc");
        assert_eq!(token_prefix(""), "");
    }

    #[test]
    fn test_expiry() {
        let now = OffsetDateTime::now_utc();
        assert!(metadata(now - Duration::seconds(1)).is_expired());
        assert!(!metadata(now + Duration::hours(1)).is_expired());

        let record = metadata(now);
        assert!(!record.is_expired_at(now));
        assert!(record.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_metadata_serialization() {
        let mut record = metadata(OffsetDateTime::UNIX_EPOCH + Duration::days(20_000));
        record.user_data = Some(serde_json::json!({"tenant": "acme"}));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["familyId"], "tkfam_1");
        assert_eq!(json["generation"], 0);
        assert!(json.get("usedAt").is_none());

        let parsed: TokenMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_token_pair_response_shape() {
        let pair = TokenPair::bearer("at".into(), "rt".into(), 3600, "openid".into());
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
        assert!(json.get("id_token").is_none());

        let json = serde_json::to_value(pair.with_id_token("idt")).unwrap();
        assert_eq!(json["id_token"], "idt");
    }

    #[test]
    fn test_validation_result_from_metadata() {
        let mut record = metadata(OffsetDateTime::now_utc());
        record.user_data = Some(serde_json::json!(1));
        let result = TokenValidationResult::from(record);
        assert_eq!(result.user_id, "u1");
        assert_eq!(result.user_profile_id, "p1");
        assert_eq!(result.user_data, Some(serde_json::json!(1)));
    }

    #[test]
    fn test_token_kind_hint() {
        assert_eq!(TokenKind::Access.to_string(), "access_token");
        assert_eq!(TokenKind::Refresh.as_str(), "refresh_token");
    }
}
