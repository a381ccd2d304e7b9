//! Signing key providers.
//!
//! A provider is asked for key material whenever the
//! [`SigningKeyManager`](super::SigningKeyManager) (re)loads. Providers do not
//! cache; the manager does.

use std::future::Future;
use std::path::PathBuf;

use async_trait::async_trait;

use super::material::SigningKeyMaterial;
use crate::AuthResult;
use crate::error::AuthError;
use crate::token::jwt::SigningAlgorithm;

/// Environment variable holding the private key PEM.
pub const ENV_PRIVATE_KEY: &str = "JWT_PRIVATE_KEY";
/// Environment variable holding the public key PEM.
pub const ENV_PUBLIC_KEY: &str = "JWT_PUBLIC_KEY";
/// Environment variable holding the key ID.
pub const ENV_KEY_ID: &str = "JWT_KEY_ID";
/// Environment variable holding the algorithm name.
pub const ENV_ALGORITHM: &str = "JWT_ALGORITHM";

/// Source of signing key material.
///
/// # Example Implementation
///
/// ```ignore
/// use mcp_oauth::keys::{SigningKeyMaterial, SigningKeyProvider};
/// use mcp_oauth::AuthResult;
///
/// struct VaultKeyProvider { client: VaultClient }
///
/// #[async_trait::async_trait]
/// impl SigningKeyProvider for VaultKeyProvider {
///     async fn load(&self) -> AuthResult<SigningKeyMaterial> {
///         let secret = self.client.read("secret/jwt").await?;
///         Ok(SigningKeyMaterial::new(secret.private, secret.public, secret.kid, secret.alg))
///     }
/// }
/// ```
#[async_trait]
pub trait SigningKeyProvider: Send + Sync {
    /// Loads the current key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the material cannot be obtained. The manager
    /// keeps serving its previous cache when this fails.
    async fn load(&self) -> AuthResult<SigningKeyMaterial>;
}

/// Provider returning fixed material.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    material: SigningKeyMaterial,
}

impl StaticKeyProvider {
    /// Creates a provider that always returns `material`.
    #[must_use]
    pub fn new(material: SigningKeyMaterial) -> Self {
        Self { material }
    }

    /// Creates a provider with a freshly generated key pair.
    ///
    /// Tokens signed with it become unverifiable after a restart, so this
    /// is meant for development only.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generated(algorithm: SigningAlgorithm) -> AuthResult<Self> {
        Ok(Self::new(SigningKeyMaterial::generate(algorithm)?))
    }
}

#[async_trait]
impl SigningKeyProvider for StaticKeyProvider {
    async fn load(&self) -> AuthResult<SigningKeyMaterial> {
        Ok(self.material.clone())
    }
}

/// Provider reading PEM keys from environment variables.
///
/// Reads [`ENV_PRIVATE_KEY`] and [`ENV_PUBLIC_KEY`] (literal `\n` sequences
/// are turned into newlines), [`ENV_KEY_ID`] (default `default`) and
/// [`ENV_ALGORITHM`] (default `ES256`). Variables are read on every load, so
/// a forced reload picks up rotated secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvKeyProvider;

impl EnvKeyProvider {
    /// Creates a provider reading the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds material from a variable lookup.
    fn material_from<F>(lookup: F) -> AuthResult<SigningKeyMaterial>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read_pem = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .map(|value| value.replace("\\n", "\n"))
                .ok_or_else(|| {
                    AuthError::configuration(format!("{} is not set in the environment", name))
                })
        };

        let private_key_pem = read_pem(ENV_PRIVATE_KEY)?;
        let public_key_pem = read_pem(ENV_PUBLIC_KEY)?;
        let key_id = lookup(ENV_KEY_ID).unwrap_or_else(|| "default".to_string());
        let algorithm = match lookup(ENV_ALGORITHM) {
            Some(name) => name
                .parse::<SigningAlgorithm>()
                .map_err(|e| AuthError::configuration(e.to_string()))?,
            None => SigningAlgorithm::ES256,
        };

        Ok(SigningKeyMaterial::new(
            private_key_pem,
            public_key_pem,
            key_id,
            algorithm,
        ))
    }
}

#[async_trait]
impl SigningKeyProvider for EnvKeyProvider {
    async fn load(&self) -> AuthResult<SigningKeyMaterial> {
        Self::material_from(|name| std::env::var(name).ok())
    }
}

/// Provider reading PEM files, such as mounted secrets.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    private_key_path: PathBuf,
    public_key_path: PathBuf,
    key_id: String,
    algorithm: SigningAlgorithm,
}

impl FileKeyProvider {
    /// Creates a provider for a pair of PEM files.
    pub fn new(
        private_key_path: impl Into<PathBuf>,
        public_key_path: impl Into<PathBuf>,
        key_id: impl Into<String>,
        algorithm: SigningAlgorithm,
    ) -> Self {
        Self {
            private_key_path: private_key_path.into(),
            public_key_path: public_key_path.into(),
            key_id: key_id.into(),
            algorithm,
        }
    }
}

#[async_trait]
impl SigningKeyProvider for FileKeyProvider {
    async fn load(&self) -> AuthResult<SigningKeyMaterial> {
        let read = |path: &PathBuf| {
            let path = path.clone();
            async move {
                tokio::fs::read_to_string(&path).await.map_err(|e| {
                    AuthError::configuration(format!(
                        "Failed to read key file {}: {}",
                        path.display(),
                        e
                    ))
                })
            }
        };

        let private_key_pem = read(&self.private_key_path).await?;
        let public_key_pem = read(&self.public_key_path).await?;

        Ok(SigningKeyMaterial::new(
            private_key_pem,
            public_key_pem,
            self.key_id.clone(),
            self.algorithm,
        ))
    }
}

/// Provider backed by an async closure.
pub struct FnKeyProvider<F> {
    load_fn: F,
}

impl<F> FnKeyProvider<F> {
    /// Wraps `load_fn`, which is called on every load.
    pub fn new(load_fn: F) -> Self {
        Self { load_fn }
    }
}

#[async_trait]
impl<F, Fut> SigningKeyProvider for FnKeyProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AuthResult<SigningKeyMaterial>> + Send,
{
    async fn load(&self) -> AuthResult<SigningKeyMaterial> {
        (self.load_fn)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
        move |name| vars.get(name).cloned()
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticKeyProvider::generated(SigningAlgorithm::ES384).unwrap();
        let first = provider.load().await.unwrap();
        let second = provider.load().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.algorithm, SigningAlgorithm::ES384);
    }

    #[test]
    fn test_env_provider_unescapes_newlines_and_defaults() {
        let material = SigningKeyMaterial::generate(SigningAlgorithm::ES256).unwrap();
        let vars = HashMap::from([
            (ENV_PRIVATE_KEY, material.private_key_pem.replace('\n', "\\n")),
            (ENV_PUBLIC_KEY, material.public_key_pem.replace('\n', "\\n")),
        ]);

        let loaded = EnvKeyProvider::material_from(lookup(vars)).unwrap();
        assert_eq!(loaded.private_key_pem, material.private_key_pem);
        assert_eq!(loaded.public_key_pem, material.public_key_pem);
        assert_eq!(loaded.key_id, "default");
        assert_eq!(loaded.algorithm, SigningAlgorithm::ES256);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_env_provider_reads_key_id_and_algorithm() {
        let material = SigningKeyMaterial::generate(SigningAlgorithm::ES512).unwrap();
        let vars = HashMap::from([
            (ENV_PRIVATE_KEY, material.private_key_pem.clone()),
            (ENV_PUBLIC_KEY, material.public_key_pem.clone()),
            (ENV_KEY_ID, "prod-key-2024".to_string()),
            (ENV_ALGORITHM, "ES512".to_string()),
        ]);

        let loaded = EnvKeyProvider::material_from(lookup(vars)).unwrap();
        assert_eq!(loaded.key_id, "prod-key-2024");
        assert_eq!(loaded.algorithm, SigningAlgorithm::ES512);
    }

    #[test]
    fn test_env_provider_missing_keys() {
        let err = EnvKeyProvider::material_from(lookup(HashMap::new())).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
        assert!(err.to_string().contains(ENV_PRIVATE_KEY));
    }

    #[test]
    fn test_env_provider_unknown_algorithm() {
        let vars = HashMap::from([
            (ENV_PRIVATE_KEY, "x".to_string()),
            (ENV_PUBLIC_KEY, "y".to_string()),
            (ENV_ALGORITHM, "HS256".to_string()),
        ]);
        assert!(EnvKeyProvider::material_from(lookup(vars)).is_err());
    }

    #[tokio::test]
    async fn test_file_provider() {
        let material = SigningKeyMaterial::generate(SigningAlgorithm::ES256).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let private_path = dir.path().join("private.pem");
        let public_path = dir.path().join("public.pem");
        std::fs::write(&private_path, &material.private_key_pem).unwrap();
        std::fs::write(&public_path, &material.public_key_pem).unwrap();

        let provider =
            FileKeyProvider::new(&private_path, &public_path, "file-key", SigningAlgorithm::ES256);
        let loaded = provider.load().await.unwrap();
        assert_eq!(loaded.private_key_pem, material.private_key_pem);
        assert_eq!(loaded.key_id, "file-key");

        let missing = FileKeyProvider::new(
            dir.path().join("nope.pem"),
            &public_path,
            "file-key",
            SigningAlgorithm::ES256,
        );
        assert!(missing.load().await.is_err());
    }

    #[tokio::test]
    async fn test_fn_provider() {
        let material = SigningKeyMaterial::generate(SigningAlgorithm::ES256).unwrap();
        let expected = material.clone();
        let provider = FnKeyProvider::new(move || {
            let material = material.clone();
            async move { Ok::<_, AuthError>(material) }
        });
        assert_eq!(provider.load().await.unwrap(), expected);
    }
}
