//! JWKS endpoint HTTP handler.
//!
//! Provides the `/.well-known/jwks.json` endpoint for JWT verification.
//!
//! # Overview
//!
//! The JWKS (JSON Web Key Set) endpoint publishes the public half of the
//! current signing key so that resource servers can verify identity tokens
//! and JWT access tokens. When signing is disabled the set is empty.
//!
//! # References
//!
//! - [RFC 7517 - JSON Web Key](https://tools.ietf.org/html/rfc7517)

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::SECURITY_HEADERS;
use crate::keys::SigningKeyManager;

/// `Cache-Control` value of the JWKS response.
pub const JWKS_CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=3600";

/// State for the JWKS endpoint.
#[derive(Clone)]
pub struct JwksState {
    /// The key manager holding the current signing key.
    pub keys: Arc<SigningKeyManager>,
}

impl JwksState {
    /// Creates a new JWKS state.
    pub fn new(keys: Arc<SigningKeyManager>) -> Self {
        Self { keys }
    }
}

/// Handler for `GET /.well-known/jwks.json`.
///
/// # Response
///
/// Returns 200 OK with `application/json` content type containing the JWKS
/// document, cacheable for one hour. If the key provider fails, returns 500
/// with an OAuth error body.
///
/// # Example Response
///
/// ```json
/// {
///   "keys": [
///     {
///       "kty": "EC",
///       "kid": "Xk3v9QeLrT2mB8aZ",
///       "use": "sig",
///       "alg": "ES256",
///       "crv": "P-256",
///       "x": "base64url-encoded-x",
///       "y": "base64url-encoded-y"
///     }
///   ]
/// }
/// ```
pub async fn jwks_handler(State(state): State<JwksState>) -> Response {
    match state.keys.get_jwk_set(false).await {
        Ok(jwks) => (
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CACHE_CONTROL, JWKS_CACHE_CONTROL),
            ],
            SECURITY_HEADERS,
            Json(jwks),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serve JWKS");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                SECURITY_HEADERS,
                Json(serde_json::json!({
                    "error": e.oauth_error_code(),
                    "error_description": "Signing keys are unavailable",
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::keys::{FnKeyProvider, SigningKeyMaterial, StaticKeyProvider};
    use crate::token::jwt::SigningAlgorithm;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    fn app(keys: SigningKeyManager) -> Router {
        Router::new()
            .route("/.well-known/jwks.json", get(jwks_handler))
            .with_state(JwksState::new(Arc::new(keys)))
    }

    async fn get_jwks(app: Router) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/.well-known/jwks.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_jwks_returns_current_key() {
        let mut material = SigningKeyMaterial::generate(SigningAlgorithm::ES256).unwrap();
        material.key_id = "k1".to_string();
        let keys = SigningKeyManager::with_provider(Arc::new(StaticKeyProvider::new(material)));

        let (status, headers, body) = get_jwks(app(keys)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::CACHE_CONTROL], JWKS_CACHE_CONTROL);
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");

        let keys = body["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0]["kid"], "k1");
        assert_eq!(keys[0]["use"], "sig");
        assert_eq!(keys[0]["alg"], "ES256");
        assert_eq!(keys[0]["kty"], "EC");
        assert_eq!(keys[0]["crv"], "P-256");
        assert!(keys[0].get("d").is_none());
    }

    #[tokio::test]
    async fn test_jwks_empty_when_disabled() {
        let (status, _, body) = get_jwks(app(SigningKeyManager::disabled())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"keys": []}));
    }

    #[tokio::test]
    async fn test_jwks_provider_failure() {
        let provider = FnKeyProvider::new(|| async {
            Err::<SigningKeyMaterial, _>(AuthError::configuration("vault unreachable"))
        });
        let keys = SigningKeyManager::with_provider(Arc::new(provider));

        let (status, headers, body) = get_jwks(app(keys)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(body["error"], "server_error");
        assert!(!body.to_string().contains("vault"));
    }
}
