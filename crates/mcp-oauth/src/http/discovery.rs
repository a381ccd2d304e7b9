//! Discovery HTTP handlers.
//!
//! Provides the metadata documents clients use to locate the authorization
//! server's endpoints and keys:
//!
//! - `/.well-known/openid-configuration` (OpenID Connect Discovery 1.0)
//! - `/.well-known/oauth-authorization-server` (RFC 8414)
//! - `/.well-known/oauth-protected-resource` (RFC 9728)

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use super::SECURITY_HEADERS;
use crate::config::OAuthConfig;
use crate::keys::SigningKeyManager;

/// State for the discovery endpoints.
#[derive(Clone)]
pub struct DiscoveryState {
    /// Server configuration.
    pub config: Arc<OAuthConfig>,
    /// Key manager, consulted for the advertised signing algorithm.
    pub keys: Arc<SigningKeyManager>,
}

impl DiscoveryState {
    /// Creates a new discovery state.
    pub fn new(config: Arc<OAuthConfig>, keys: Arc<SigningKeyManager>) -> Self {
        Self { config, keys }
    }

    /// Algorithms of the keys currently in use; empty when signing is
    /// disabled or the keys cannot be loaded.
    async fn signing_algorithms(&self) -> Vec<String> {
        if !self.keys.is_enabled() {
            return Vec::new();
        }
        match self.keys.get_signing_keys(false).await {
            Ok(material) => vec![material.algorithm.to_string()],
            Err(e) => {
                tracing::warn!(error = %e, "Signing algorithm unavailable for discovery");
                Vec::new()
            }
        }
    }
}

/// Builds the RFC 8414 authorization server metadata.
#[must_use]
pub fn authorization_server_metadata(config: &OAuthConfig) -> Value {
    let discovery = &config.discovery;
    json!({
        "issuer": config.server_url,
        "authorization_endpoint": config.endpoint_url(&discovery.authorization_endpoint),
        "token_endpoint": config.endpoint_url(&discovery.token_endpoint),
        "registration_endpoint": config.endpoint_url(&discovery.registration_endpoint),
        "revocation_endpoint": config.endpoint_url(&discovery.revocation_endpoint),
        "introspection_endpoint": config.endpoint_url(&discovery.introspection_endpoint),
        "jwks_uri": config.jwks_uri(),
        "scopes_supported": discovery.scopes_supported,
        "response_types_supported": discovery.response_types_supported,
        "grant_types_supported": discovery.grant_types_supported,
        "token_endpoint_auth_methods_supported": discovery.token_endpoint_auth_methods_supported,
        "code_challenge_methods_supported": discovery.code_challenge_methods_supported,
    })
}

/// Builds the OpenID Connect discovery document.
///
/// Extends the authorization server metadata with the OIDC specific fields.
/// `signing_algs` is empty while signing is disabled.
#[must_use]
pub fn openid_configuration(config: &OAuthConfig, signing_algs: &[String]) -> Value {
    let mut doc = authorization_server_metadata(config);
    doc["subject_types_supported"] = json!(["public"]);
    doc["id_token_signing_alg_values_supported"] = json!(signing_algs);
    doc["claims_supported"] = json!(config.discovery.claims_supported);
    if let Some(userinfo) = &config.discovery.userinfo_endpoint {
        doc["userinfo_endpoint"] = json!(userinfo);
    }
    doc
}

/// Builds the RFC 9728 protected resource metadata.
#[must_use]
pub fn protected_resource_metadata(config: &OAuthConfig) -> Value {
    json!({
        "resource": config.resource,
        "authorization_servers": [config.server_url],
        "jwks_uri": config.jwks_uri(),
        "scopes_supported": config.discovery.scopes_supported,
        "bearer_methods_supported": config.discovery.bearer_methods_supported,
        "resource_name": config.discovery.resource_name,
    })
}

/// Handler for `GET /.well-known/openid-configuration`.
///
/// Uses the configured `server_url` for all endpoint URLs, not the bind
/// address.
pub async fn openid_configuration_handler(
    State(state): State<DiscoveryState>,
) -> impl IntoResponse {
    let algs = state.signing_algorithms().await;
    (
        [(header::CONTENT_TYPE, "application/json")],
        SECURITY_HEADERS,
        Json(openid_configuration(&state.config, &algs)),
    )
}

/// Handler for `GET /.well-known/oauth-authorization-server`.
pub async fn authorization_server_handler(
    State(state): State<DiscoveryState>,
) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        SECURITY_HEADERS,
        Json(authorization_server_metadata(&state.config)),
    )
}

/// Handler for `GET /.well-known/oauth-protected-resource`.
pub async fn protected_resource_handler(
    State(state): State<DiscoveryState>,
) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        SECURITY_HEADERS,
        Json(protected_resource_metadata(&state.config)),
    )
}
