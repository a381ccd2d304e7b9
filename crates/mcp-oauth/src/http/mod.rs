//! HTTP handlers for the well-known endpoints.
//!
//! This module provides Axum handlers for key publication and discovery.
//!
//! # Available Handlers
//!
//! - [`jwks`] - Public key set (RFC 7517)
//! - [`discovery`] - OpenID Connect, RFC 8414, and RFC 9728 metadata
//!
//! # Usage
//!
//! ```ignore
//! let app = axum::Router::new()
//!     .merge(well_known_router(WellKnownState::new(config, keys)));
//! ```

pub mod discovery;
pub mod jwks;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::http::{HeaderName, header};
use axum::routing::get;

use crate::config::OAuthConfig;
use crate::keys::SigningKeyManager;

pub use discovery::{
    DiscoveryState, authorization_server_handler, authorization_server_metadata,
    openid_configuration, openid_configuration_handler, protected_resource_handler,
    protected_resource_metadata,
};
pub use jwks::{JWKS_CACHE_CONTROL, JwksState, jwks_handler};

/// Headers attached to every well-known response.
pub(crate) const SECURITY_HEADERS: [(HeaderName, &str); 2] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
];

/// Shared state of the well-known router.
#[derive(Clone)]
pub struct WellKnownState {
    pub config: Arc<OAuthConfig>,
    pub keys: Arc<SigningKeyManager>,
}

impl WellKnownState {
    /// Creates the router state.
    pub fn new(config: Arc<OAuthConfig>, keys: Arc<SigningKeyManager>) -> Self {
        Self { config, keys }
    }
}

impl FromRef<WellKnownState> for JwksState {
    fn from_ref(state: &WellKnownState) -> Self {
        JwksState::new(state.keys.clone())
    }
}

impl FromRef<WellKnownState> for DiscoveryState {
    fn from_ref(state: &WellKnownState) -> Self {
        DiscoveryState::new(state.config.clone(), state.keys.clone())
    }
}

/// Builds a router serving the JWKS and discovery documents.
pub fn well_known_router(state: WellKnownState) -> Router {
    Router::new()
        .route("/.well-known/jwks.json", get(jwks_handler))
        .route(
            "/.well-known/openid-configuration",
            get(openid_configuration_handler),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(authorization_server_handler),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(protected_resource_handler),
        )
        .with_state(state)
}
