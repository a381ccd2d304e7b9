//! Signing key manager with time-based cache refresh.
//!
//! The manager owns the server's current key pair and the JWKS derived from
//! it. Both live in one immutable [`LoadedKeys`] snapshot behind an
//! `ArcSwapOption`, so readers never see a half-replaced cache and a failed
//! reload leaves the previous snapshot in place.
//!
//! Concurrent callers that find the cache stale may each trigger a reload.
//! That is redundant work but harmless as long as the provider is stable.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::time::Instant;

use super::material::SigningKeyMaterial;
use super::provider::SigningKeyProvider;
use crate::AuthResult;
use crate::config::SigningConfig;
use crate::error::AuthError;
use crate::token::jwt::{Jwks, SigningKeyPair};

/// Default cache lifetime of loaded keys.
pub const DEFAULT_KEY_CACHE_TTL: Duration = Duration::from_secs(3600);

/// One successful load: material, the parsed key pair, and the public view.
struct LoadedKeys {
    material: SigningKeyMaterial,
    key_pair: Arc<SigningKeyPair>,
    jwks: Jwks,
    loaded_at: Instant,
}

/// Returns `true` once more than `ttl` has passed since `loaded_at`.
#[must_use]
pub fn is_stale(loaded_at: Instant, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(loaded_at) > ttl
}

/// Owns the current signing keys and their JWKS representation.
pub struct SigningKeyManager {
    provider: Option<Arc<dyn SigningKeyProvider>>,
    ttl: Duration,
    cache: ArcSwapOption<LoadedKeys>,
}

impl SigningKeyManager {
    /// Creates a manager. Passing `None` disables signing.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn SigningKeyProvider>>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            cache: ArcSwapOption::empty(),
        }
    }

    /// Creates a manager using the TTL from configuration.
    #[must_use]
    pub fn from_config(provider: Option<Arc<dyn SigningKeyProvider>>, config: &SigningConfig) -> Self {
        Self::new(provider, config.key_cache_ttl)
    }

    /// Creates a manager with a provider and the default one hour TTL.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn SigningKeyProvider>) -> Self {
        Self::new(Some(provider), DEFAULT_KEY_CACHE_TTL)
    }

    /// Creates a manager with signing disabled.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_KEY_CACHE_TTL)
    }

    /// Returns `true` if a key provider is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Eagerly loads keys at startup when signing is enabled.
    ///
    /// # Errors
    /// Returns the load error so a misconfigured deployment fails fast.
    pub async fn initialize(&self) -> AuthResult<()> {
        if self.is_enabled() {
            self.load().await?;
        }
        Ok(())
    }

    /// Returns the current key material, reloading when stale or forced.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` when no provider is configured,
    /// or the provider/validation error when a reload fails.
    pub async fn get_signing_keys(&self, force_refresh: bool) -> AuthResult<SigningKeyMaterial> {
        Ok(self.current(force_refresh).await?.material.clone())
    }

    /// Returns the public key set, reloading when stale or forced.
    ///
    /// A disabled manager yields an empty set.
    ///
    /// # Errors
    /// Returns the provider/validation error when a reload fails.
    pub async fn get_jwk_set(&self, force_refresh: bool) -> AuthResult<Jwks> {
        if !self.is_enabled() {
            return Ok(Jwks::new());
        }
        Ok(self.current(force_refresh).await?.jwks.clone())
    }

    /// Forces a reload, for manual key rotation.
    ///
    /// # Errors
    /// Returns the provider/validation error; the previous keys stay active.
    pub async fn reload_keys(&self) -> AuthResult<()> {
        tracing::info!("Forcing signing key reload");
        self.load().await.map(|_| ())
    }

    /// Returns the parsed key pair used by the token services.
    ///
    /// # Errors
    /// Returns `AuthError::SigningDisabled` when no provider is configured.
    pub(crate) async fn signing_key_pair(&self, force_refresh: bool) -> AuthResult<Arc<SigningKeyPair>> {
        if !self.is_enabled() {
            return Err(AuthError::signing_disabled(
                "JWT signing key provider not configured",
            ));
        }
        Ok(self.current(force_refresh).await?.key_pair.clone())
    }

    async fn current(&self, force_refresh: bool) -> AuthResult<Arc<LoadedKeys>> {
        if !force_refresh {
            if let Some(cached) = self.cache.load_full() {
                if !is_stale(cached.loaded_at, Instant::now(), self.ttl) {
                    return Ok(cached);
                }
                tracing::debug!(key_id = %cached.material.key_id, "Signing key cache stale");
            }
        }
        self.load().await
    }

    async fn load(&self) -> AuthResult<Arc<LoadedKeys>> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            AuthError::configuration("JWT signing key provider not configured")
        })?;

        let started = Instant::now();
        let loaded = match Self::load_from(provider.as_ref()).await {
            Ok(loaded) => Arc::new(loaded),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    category = %e.category(),
                    "Failed to load signing keys"
                );
                return Err(e);
            }
        };

        self.cache.store(Some(loaded.clone()));
        tracing::info!(
            key_id = %loaded.material.key_id,
            algorithm = %loaded.material.algorithm,
            load_time_ms = started.elapsed().as_millis() as u64,
            "Signing keys loaded and validated"
        );

        Ok(loaded)
    }

    async fn load_from(provider: &dyn SigningKeyProvider) -> AuthResult<LoadedKeys> {
        let material = provider.load().await?;
        material.validate()?;

        let key_pair = SigningKeyPair::from_pem(
            material.key_id.clone(),
            material.algorithm,
            &material.private_key_pem,
            &material.public_key_pem,
        )
        .map_err(|e| {
            AuthError::signing_key(format!(
                "Invalid key pair for {}: {}",
                material.algorithm, e
            ))
        })?;
        let jwks = key_pair.jwks();

        Ok(LoadedKeys {
            material,
            key_pair: Arc::new(key_pair),
            jwks,
            loaded_at: Instant::now(),
        })
    }
}

impl std::fmt::Debug for SigningKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyManager")
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
