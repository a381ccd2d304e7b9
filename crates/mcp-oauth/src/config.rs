//! Token issuance configuration.
//!
//! All durations use humantime notation when loaded from TOML or JSON
//! (`"1h"`, `"30d"`). Every section carries defaults, so an empty document
//! yields a usable development configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the token issuance core.
///
/// # Example (TOML)
///
/// ```toml
/// [oauth]
/// server_url = "https://mcp.example.com"
/// resource = "https://mcp.example.com/mcp"
/// access_token_format = "jwt"
///
/// [oauth.tokens]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "30d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Public base URL of the authorization server.
    /// Used as the `iss` claim of every signed token.
    pub server_url: String,

    /// Default protected resource identifier.
    /// Used as the audience of JWT access tokens.
    pub resource: String,

    /// Representation of issued access tokens.
    pub access_token_format: AccessTokenFormat,

    /// Token lifetimes.
    pub tokens: TokenLifetimeConfig,

    /// Signing key cache behaviour.
    pub signing: SigningConfig,

    /// Expired token housekeeping.
    pub cleanup: CleanupConfig,

    /// Advertised discovery metadata.
    pub discovery: DiscoveryConfig,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            resource: "http://localhost:3000/mcp".to_string(),
            access_token_format: AccessTokenFormat::default(),
            tokens: TokenLifetimeConfig::default(),
            signing: SigningConfig::default(),
            cleanup: CleanupConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// How access tokens are represented on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTokenFormat {
    /// Random string, validated by storage lookup.
    #[default]
    Opaque,
    /// RFC 9068 signed JWT, with a storage record per `jti` for revocation.
    Jwt,
}

impl AccessTokenFormat {
    /// Returns the format name used in configuration and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Jwt => "jwt",
        }
    }
}

/// Token lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifetimeConfig {
    /// Access token lifetime (opaque and JWT).
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime. Each rotation issues a token with a fresh lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Identity token lifetime.
    #[serde(with = "humantime_serde")]
    pub id_token_lifetime: Duration,
}

impl Default for TokenLifetimeConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(3600), // 1 hour
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
            id_token_lifetime: Duration::from_secs(3600),     // 1 hour
        }
    }
}

/// Signing key cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// How long loaded key material is served before the provider is asked again.
    #[serde(with = "humantime_serde")]
    pub key_cache_ttl: Duration,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_cache_ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Expired token cleanup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Whether the embedding server should run the periodic cleanup task.
    pub enabled: bool,

    /// Period between cleanup runs.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Tokens are purged once they have been expired for longer than this.
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(24 * 3600), // daily
            retention: Duration::from_secs(7 * 24 * 3600), // 7 days
        }
    }
}

impl CleanupConfig {
    /// Retention window in whole days, as passed to the store.
    #[must_use]
    pub fn retention_days(&self) -> u32 {
        u32::try_from(self.retention.as_secs() / 86_400).unwrap_or(u32::MAX)
    }
}

/// Discovery metadata configuration.
///
/// Endpoint values are paths relative to `server_url`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Authorization endpoint path.
    pub authorization_endpoint: String,
    /// Token endpoint path.
    pub token_endpoint: String,
    /// Dynamic client registration endpoint path.
    pub registration_endpoint: String,
    /// Revocation endpoint path.
    pub revocation_endpoint: String,
    /// Introspection endpoint path.
    pub introspection_endpoint: String,
    /// Absolute userinfo endpoint URL, if one is served.
    pub userinfo_endpoint: Option<String>,
    /// Advertised scopes.
    pub scopes_supported: Vec<String>,
    /// Advertised response types.
    pub response_types_supported: Vec<String>,
    /// Advertised grant types.
    pub grant_types_supported: Vec<String>,
    /// Advertised token endpoint client authentication methods.
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Advertised PKCE methods.
    pub code_challenge_methods_supported: Vec<String>,
    /// Advertised identity token claims.
    pub claims_supported: Vec<String>,
    /// Bearer token presentation methods accepted by the resource.
    pub bearer_methods_supported: Vec<String>,
    /// Human readable resource name.
    pub resource_name: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            authorization_endpoint: "/auth/authorize".to_string(),
            token_endpoint: "/auth/token".to_string(),
            registration_endpoint: "/auth/register".to_string(),
            revocation_endpoint: "/auth/revoke".to_string(),
            introspection_endpoint: "/auth/introspect".to_string(),
            userinfo_endpoint: None,
            scopes_supported: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
                "offline_access".to_string(),
            ],
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_basic".to_string(),
                "client_secret_post".to_string(),
                "none".to_string(),
            ],
            code_challenge_methods_supported: vec!["S256".to_string()],
            claims_supported: [
                "sub",
                "iss",
                "aud",
                "exp",
                "iat",
                "auth_time",
                "nonce",
                "name",
                "preferred_username",
                "email",
                "email_verified",
                "picture",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            bearer_methods_supported: vec!["header".to_string()],
            resource_name: "MCP Server".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl OAuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for empty required values and
    /// `ConfigError::InvalidValue` for malformed or out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.is_empty() {
            return Err(ConfigError::Missing("server_url".to_string()));
        }
        url::Url::parse(&self.server_url).map_err(|e| {
            ConfigError::InvalidValue(format!(
                "server_url '{}' is not a valid URL: {}",
                self.server_url, e
            ))
        })?;

        if self.resource.is_empty() {
            return Err(ConfigError::Missing("resource".to_string()));
        }

        for (name, value) in [
            ("access_token_lifetime", self.tokens.access_token_lifetime),
            ("refresh_token_lifetime", self.tokens.refresh_token_lifetime),
            ("id_token_lifetime", self.tokens.id_token_lifetime),
            ("key_cache_ttl", self.signing.key_cache_ttl),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{} must be > 0", name)));
            }
        }

        if self.cleanup.enabled {
            if self.cleanup.interval.is_zero() {
                return Err(ConfigError::InvalidValue(
                    "cleanup interval must be > 0".to_string(),
                ));
            }
            if self.cleanup.retention_days() == 0 {
                return Err(ConfigError::InvalidValue(
                    "cleanup retention must be at least one day".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Builds an absolute URL for a path relative to `server_url`.
    #[must_use]
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// The advertised JWKS location.
    #[must_use]
    pub fn jwks_uri(&self) -> String {
        self.endpoint_url("/.well-known/jwks.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OAuthConfig::default();
        assert_eq!(config.server_url, "http://localhost:3000");
        assert_eq!(config.access_token_format, AccessTokenFormat::Opaque);
        assert_eq!(
            config.tokens.access_token_lifetime,
            Duration::from_secs(3600)
        );
        assert_eq!(config.signing.key_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.cleanup.retention_days(), 7);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(OAuthConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_server_url_fails_validation() {
        let config = OAuthConfig {
            server_url: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("server_url"));
    }

    #[test]
    fn test_malformed_server_url_fails_validation() {
        let config = OAuthConfig {
            server_url: "not a url".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_zero_lifetime_fails_validation() {
        let mut config = OAuthConfig::default();
        config.tokens.refresh_token_lifetime = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_token_lifetime"));
    }

    #[test]
    fn test_short_retention_fails_validation() {
        let mut config = OAuthConfig::default();
        config.cleanup.retention = Duration::from_secs(3600);
        assert!(config.validate().is_err());

        config.cleanup.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_urls() {
        let config = OAuthConfig {
            server_url: "https://mcp.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.jwks_uri(),
            "https://mcp.example.com/.well-known/jwks.json"
        );
        assert_eq!(
            config.endpoint_url(&config.discovery.token_endpoint),
            "https://mcp.example.com/auth/token"
        );
    }

    #[test]
    fn test_toml_with_humantime_durations() {
        let config: OAuthConfig = toml::from_str(
            r#"
            server_url = "https://mcp.example.com"
            access_token_format = "jwt"

            [tokens]
            access_token_lifetime = "15m"
            refresh_token_lifetime = "14days"

            [cleanup]
            retention = "3d"
            "#,
        )
        .unwrap();

        assert_eq!(config.access_token_format, AccessTokenFormat::Jwt);
        assert_eq!(config.tokens.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(
            config.tokens.refresh_token_lifetime,
            Duration::from_secs(14 * 86_400)
        );
        assert_eq!(config.tokens.id_token_lifetime, Duration::from_secs(3600));
        assert_eq!(config.cleanup.retention_days(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue("test error".to_string());
        assert_eq!(err.to_string(), "Invalid configuration value: test error");

        let err = ConfigError::Missing("resource".to_string());
        assert_eq!(err.to_string(), "Missing required configuration: resource");
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = OAuthConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: OAuthConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.server_url, parsed.server_url);
        assert_eq!(config.access_token_format, parsed.access_token_format);
        assert_eq!(config.cleanup.interval, parsed.cleanup.interval);
    }
}
