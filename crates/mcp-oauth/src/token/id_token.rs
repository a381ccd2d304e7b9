//! OpenID Connect identity tokens.
//!
//! Generation is a hard failure path: any problem yields a generic
//! `AuthError::TokenGeneration` and the cause is only logged. Validation is a
//! soft failure path: untrusted input yields `None`, never an error.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::jwt::{ClaimChecks, expiry_after};
use super::scope::{EMAIL, PROFILE, has_scope};
use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::keys::SigningKeyManager;

const GENERATION_FAILED: &str = "Failed to generate ID token";

/// Claims of an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer.
    pub iss: String,
    /// Subject (user ID).
    pub sub: String,
    /// Audience (client ID).
    pub aud: String,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Authorized party (client ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    /// Time of the end-user authentication (seconds since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    /// Nonce from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Display name (profile scope).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Username (profile scope).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// Avatar URL (profile scope).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Email address (email scope).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the email address is verified (email scope).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

/// Profile data the identity token may disclose, depending on scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Username, emitted as `preferred_username`.
    pub username: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Display name, emitted as `name`.
    pub display_name: Option<String>,
    /// Avatar URL, emitted as `picture`.
    pub avatar_url: Option<String>,
    /// Whether the email address is verified. Treated as `false` when unknown.
    pub email_verified: Option<bool>,
}

/// Input for [`IdTokenService::generate_id_token`].
#[derive(Debug, Clone)]
pub struct IdTokenRequest {
    /// Subject.
    pub user_id: String,
    /// Audience and authorized party.
    pub client_id: String,
    /// Issuer.
    pub issuer: String,
    /// Token lifetime.
    pub expires_in: Duration,
    /// Nonce from the authorization request.
    pub nonce: Option<String>,
    /// When the user authenticated.
    pub auth_time: Option<OffsetDateTime>,
    /// Granted scope, gating profile and email claims.
    pub scope: Option<String>,
    /// Profile data to disclose.
    pub user_profile: Option<UserProfile>,
}

impl IdTokenRequest {
    /// Creates a request with the required fields and no optional claims.
    pub fn new(
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        issuer: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: client_id.into(),
            issuer: issuer.into(),
            expires_in,
            nonce: None,
            auth_time: None,
            scope: None,
            user_profile: None,
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the authentication time.
    #[must_use]
    pub fn auth_time(mut self, auth_time: OffsetDateTime) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    /// Sets the granted scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the user profile.
    #[must_use]
    pub fn user_profile(mut self, profile: UserProfile) -> Self {
        self.user_profile = Some(profile);
        self
    }

    /// Builds the claim set as of `now`, or `None` if the expiry overflows.
    fn claims(&self, now: OffsetDateTime) -> Option<IdTokenClaims> {
        let iat = now.unix_timestamp();
        let mut claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: self.user_id.clone(),
            aud: self.client_id.clone(),
            exp: expiry_after(iat, self.expires_in)?,
            iat,
            azp: Some(self.client_id.clone()),
            auth_time: self.auth_time.map(OffsetDateTime::unix_timestamp),
            nonce: self.nonce.clone(),
            name: None,
            preferred_username: None,
            picture: None,
            email: None,
            email_verified: None,
        };

        let scope = self.scope.as_deref();
        if let Some(profile) = &self.user_profile {
            if has_scope(scope, PROFILE) {
                claims.name = profile.display_name.clone();
                claims.preferred_username = profile.username.clone();
                claims.picture = profile.avatar_url.clone();
            }
            if has_scope(scope, EMAIL) && profile.email.is_some() {
                claims.email = profile.email.clone();
                claims.email_verified = Some(profile.email_verified.unwrap_or(false));
            }
        }

        Some(claims)
    }
}

/// Mints and validates identity tokens with the current signing key.
#[derive(Debug, Clone)]
pub struct IdTokenService {
    keys: Arc<SigningKeyManager>,
    issuer: String,
    lifetime: Duration,
}

impl IdTokenService {
    /// Creates the service, taking the issuer from `server_url` and the
    /// lifetime from `tokens.id_token_lifetime`.
    #[must_use]
    pub fn new(config: &OAuthConfig, keys: Arc<SigningKeyManager>) -> Self {
        Self {
            keys,
            issuer: config.server_url.clone(),
            lifetime: config.tokens.id_token_lifetime,
        }
    }

    /// Configured identity token lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Starts a request with the configured issuer and lifetime.
    pub fn request(
        &self,
        user_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> IdTokenRequest {
        IdTokenRequest::new(user_id, client_id, self.issuer.clone(), self.lifetime)
    }

    /// Signs an identity token.
    ///
    /// The header carries `typ: JWT` and the current key's `kid` and `alg`.
    ///
    /// # Errors
    /// Returns `AuthError::TokenGeneration` with a generic message if signing
    /// is disabled, the keys cannot be loaded, or signing fails.
    pub async fn generate_id_token(&self, request: &IdTokenRequest) -> AuthResult<String> {
        let key_pair = self.keys.signing_key_pair(false).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to generate ID token");
            AuthError::token_generation(GENERATION_FAILED)
        })?;

        let claims = request.claims(OffsetDateTime::now_utc()).ok_or_else(|| {
            tracing::error!(expires_in = ?request.expires_in, "ID token lifetime out of range");
            AuthError::token_generation(GENERATION_FAILED)
        })?;
        let token = key_pair.encode("JWT", &claims).map_err(|e| {
            tracing::error!(error = %e, "Failed to generate ID token");
            AuthError::token_generation(GENERATION_FAILED)
        })?;

        tracing::debug!(
            user_id = %request.user_id,
            client_id = %request.client_id,
            scope = request.scope.as_deref().unwrap_or(""),
            kid = %key_pair.kid,
            "Generated ID token"
        );

        Ok(token)
    }

    /// Verifies an identity token against the current key and issuer.
    ///
    /// Returns `None` for a bad signature, an expired token, an issuer
    /// mismatch, a malformed token, or when signing is disabled.
    pub async fn validate_id_token(&self, token: &str, expected_issuer: &str) -> Option<IdTokenClaims> {
        let key_pair = match self.keys.signing_key_pair(false).await {
            Ok(key_pair) => key_pair,
            Err(e) => {
                tracing::debug!(error = %e, "ID token validation unavailable");
                return None;
            }
        };

        match key_pair.decode::<IdTokenClaims>(token, &ClaimChecks::issuer(expected_issuer)) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "ID token validation failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{SigningKeyMaterial, StaticKeyProvider};
    use crate::token::jwt::{SigningAlgorithm, SigningKeyPair, decode_unverified, peek_header};

    const ISSUER: &str = "https://auth.example.com";

    fn service_with(material: SigningKeyMaterial) -> IdTokenService {
        let keys = SigningKeyManager::with_provider(Arc::new(StaticKeyProvider::new(material)));
        IdTokenService::new(&OAuthConfig::default(), Arc::new(keys))
    }

    fn make_service(algorithm: SigningAlgorithm) -> IdTokenService {
        service_with(SigningKeyMaterial::generate(algorithm).unwrap())
    }

    fn request() -> IdTokenRequest {
        IdTokenRequest::new("user-123", "client-456", ISSUER, Duration::from_secs(3600))
    }

    fn profile() -> UserProfile {
        UserProfile {
            username: Some("johndoe".to_string()),
            email: Some("john@example.com".to_string()),
            display_name: Some("John Doe".to_string()),
            avatar_url: Some("https://example.com/avatar.jpg".to_string()),
            email_verified: None,
        }
    }

    #[tokio::test]
    async fn test_required_claims_round_trip() {
        for algorithm in [
            SigningAlgorithm::ES256,
            SigningAlgorithm::ES384,
            SigningAlgorithm::ES512,
        ] {
            let service = make_service(algorithm);
            let token = service.generate_id_token(&request()).await.unwrap();
            assert_eq!(token.split('.').count(), 3);

            let claims = service.validate_id_token(&token, ISSUER).await.unwrap();
            assert_eq!(claims.iss, ISSUER);
            assert_eq!(claims.sub, "user-123");
            assert_eq!(claims.aud, "client-456");
            assert_eq!(claims.azp.as_deref(), Some("client-456"));
            assert_eq!(claims.exp - claims.iat, 3600);
            assert!(claims.nonce.is_none());
            assert!(claims.auth_time.is_none());
        }
    }

    #[tokio::test]
    async fn test_request_uses_configured_issuer_and_lifetime() {
        let config = OAuthConfig {
            server_url: ISSUER.to_string(),
            tokens: crate::config::TokenLifetimeConfig {
                id_token_lifetime: Duration::from_secs(900),
                ..Default::default()
            },
            ..Default::default()
        };
        let material = SigningKeyMaterial::generate(SigningAlgorithm::ES256).unwrap();
        let keys = SigningKeyManager::with_provider(Arc::new(StaticKeyProvider::new(material)));
        let service = IdTokenService::new(&config, Arc::new(keys));
        assert_eq!(service.lifetime(), Duration::from_secs(900));

        let token = service
            .generate_id_token(&service.request("user-123", "client-456"))
            .await
            .unwrap();
        let claims = service.validate_id_token(&token, ISSUER).await.unwrap();
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[tokio::test]
    async fn test_header_uses_current_key() {
        let mut material = SigningKeyMaterial::generate(SigningAlgorithm::ES256).unwrap();
        material.key_id = "k1".to_string();
        let token = service_with(material)
            .generate_id_token(&request())
            .await
            .unwrap();

        let header = peek_header(&token).unwrap();
        assert_eq!(header.alg, "ES256");
        assert_eq!(header.typ.as_deref(), Some("JWT"));
        assert_eq!(header.kid.as_deref(), Some("k1"));
    }

    #[tokio::test]
    async fn test_nonce_and_auth_time() {
        let service = make_service(SigningAlgorithm::ES256);
        let auth_time = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let request = request().nonce("random-nonce-123").auth_time(auth_time);

        let token = service.generate_id_token(&request).await.unwrap();
        let claims = service.validate_id_token(&token, ISSUER).await.unwrap();
        assert_eq!(claims.nonce.as_deref(), Some("random-nonce-123"));
        assert_eq!(claims.auth_time, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_profile_scope_without_email() {
        let service = make_service(SigningAlgorithm::ES256);
        let request = request().scope("openid profile").user_profile(UserProfile {
            display_name: Some("Ada Lovelace".to_string()),
            username: Some("ada".to_string()),
            ..Default::default()
        });

        let token = service.generate_id_token(&request).await.unwrap();
        let payload: serde_json::Value = decode_unverified(&token).unwrap();
        assert_eq!(payload["name"], "Ada Lovelace");
        assert_eq!(payload["preferred_username"], "ada");
        assert!(payload.get("email").is_none());
        assert!(payload.get("email_verified").is_none());
        assert!(payload.get("picture").is_none());
    }

    #[tokio::test]
    async fn test_email_scope_defaults_verified_false() {
        let service = make_service(SigningAlgorithm::ES256);
        let request = request().scope("openid email").user_profile(profile());

        let token = service.generate_id_token(&request).await.unwrap();
        let claims = service.validate_id_token(&token, ISSUER).await.unwrap();
        assert_eq!(claims.email.as_deref(), Some("john@example.com"));
        assert_eq!(claims.email_verified, Some(false));
        assert!(claims.name.is_none());
        assert!(claims.preferred_username.is_none());
    }

    #[tokio::test]
    async fn test_all_scopes() {
        let service = make_service(SigningAlgorithm::ES384);
        let mut user = profile();
        user.email_verified = Some(true);
        let request = request().scope("openid profile email").user_profile(user);

        let token = service.generate_id_token(&request).await.unwrap();
        let claims = service.validate_id_token(&token, ISSUER).await.unwrap();
        assert_eq!(claims.name.as_deref(), Some("John Doe"));
        assert_eq!(claims.preferred_username.as_deref(), Some("johndoe"));
        assert_eq!(
            claims.picture.as_deref(),
            Some("https://example.com/avatar.jpg")
        );
        assert_eq!(claims.email.as_deref(), Some("john@example.com"));
        assert_eq!(claims.email_verified, Some(true));
    }

    #[tokio::test]
    async fn test_openid_scope_alone_has_no_profile_claims() {
        let service = make_service(SigningAlgorithm::ES256);
        let request = request().scope("openid").user_profile(profile());

        let token = service.generate_id_token(&request).await.unwrap();
        let payload: serde_json::Value = decode_unverified(&token).unwrap();
        for claim in ["name", "preferred_username", "picture", "email", "email_verified"] {
            assert!(payload.get(claim).is_none(), "unexpected claim {}", claim);
        }
    }

    #[tokio::test]
    async fn test_generation_fails_generically_when_disabled() {
        let service = IdTokenService::new(&OAuthConfig::default(), Arc::new(SigningKeyManager::disabled()));
        let err = service.generate_id_token(&request()).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenGeneration { .. }));
        assert_eq!(err.to_string(), "Failed to generate ID token");
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_fails_generation() {
        let service = make_service(SigningAlgorithm::ES256);
        let request = IdTokenRequest::new("user-123", "client-456", ISSUER, Duration::MAX);
        assert!(request.claims(OffsetDateTime::now_utc()).is_none());

        let err = service.generate_id_token(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to generate ID token");
    }

    #[tokio::test]
    async fn test_validation_soft_failures() {
        let service = make_service(SigningAlgorithm::ES256);
        let token = service.generate_id_token(&request()).await.unwrap();

        // Wrong issuer
        assert!(
            service
                .validate_id_token(&token, "https://evil.example.com")
                .await
                .is_none()
        );

        // Malformed
        assert!(service.validate_id_token("not.a.jwt", ISSUER).await.is_none());
        assert!(service.validate_id_token("", ISSUER).await.is_none());

        // Signed by another key
        let other = make_service(SigningAlgorithm::ES256);
        let foreign = other.generate_id_token(&request()).await.unwrap();
        assert!(service.validate_id_token(&foreign, ISSUER).await.is_none());

        // Disabled
        let disabled = IdTokenService::new(&OAuthConfig::default(), Arc::new(SigningKeyManager::disabled()));
        assert!(disabled.validate_id_token(&token, ISSUER).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid() {
        let material = SigningKeyMaterial::generate(SigningAlgorithm::ES256).unwrap();
        let key_pair = SigningKeyPair::from_pem(
            material.key_id.clone(),
            material.algorithm,
            &material.private_key_pem,
            &material.public_key_pem,
        )
        .unwrap();
        let service = service_with(material);

        let past = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let expired = key_pair.encode("JWT", &request().claims(past).unwrap()).unwrap();
        assert!(service.validate_id_token(&expired, ISSUER).await.is_none());
    }
}
