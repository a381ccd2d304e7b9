//! Compact JWS signing and verification with ECDSA keys.
//!
//! Identity tokens and JWT access tokens are both produced here. Three
//! algorithms are supported:
//!
//! - **ES256**: ECDSA with P-256 and SHA-256
//! - **ES384**: ECDSA with P-384 and SHA-384
//! - **ES512**: ECDSA with P-521 and SHA-512
//!
//! ES256 and ES384 go through `jsonwebtoken`. It has no ES512 support, so
//! P-521 tokens are assembled and verified directly with the `p521` crate
//! using the same registered-claim rules.
//!
//! ## Example
//!
//! ```ignore
//! use mcp_oauth::token::jwt::{ClaimChecks, SigningAlgorithm, SigningKeyPair, generate_ec_pem_pair};
//!
//! let (private_pem, public_pem) = generate_ec_pem_pair(SigningAlgorithm::ES256)?;
//! let key_pair = SigningKeyPair::from_pem("k1", SigningAlgorithm::ES256, &private_pem, &public_pem)?;
//!
//! let token = key_pair.encode("JWT", &claims)?;
//! let claims: MyClaims = key_pair.decode(&token, &ClaimChecks::issuer("https://auth.example.com"))?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use elliptic_curve::sec1::ToEncodedPoint;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use p521::ecdsa::signature::{Signer, Verifier};
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Failure inside the JWS layer.
///
/// The token services log these and surface either a generic generation
/// error or `None` from validation.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// Key material could not be parsed, generated, or paired.
    #[error("invalid key: {0}")]
    Key(String),

    #[error("unsupported algorithm '{0}', expected ES256, ES384, or ES512")]
    UnsupportedAlgorithm(String),

    #[error("token expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    /// A registered claim is missing or has the wrong value.
    #[error("claim rejected: {0}")]
    Claim(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer => Self::Claim(err.to_string()),
            ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => Self::Key(err.to_string()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// ECDSA with P-256 curve.
    ES256,
    /// ECDSA with P-384 curve.
    ES384,
    /// ECDSA with P-521 curve.
    ES512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    ///
    /// Returns `None` for ES512, which `jsonwebtoken` cannot handle.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Option<Algorithm> {
        match self {
            Self::ES256 => Some(Algorithm::ES256),
            Self::ES384 => Some(Algorithm::ES384),
            Self::ES512 => None,
        }
    }

    /// Returns the algorithm name as used in JWK/JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
        }
    }

    /// Returns the JWK curve name.
    #[must_use]
    pub fn curve(&self) -> &'static str {
        match self {
            Self::ES256 => "P-256",
            Self::ES384 => "P-384",
            Self::ES512 => "P-521",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            "ES512" => Ok(Self::ES512),
            other => Err(JwtError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

// ============================================================================
// JWKS Types
// ============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Creates a new empty JWKS.
    #[must_use]
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Adds a key to the set.
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }
}

impl Default for Jwks {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON Web Key for an EC public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always "EC".
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig" for signing).
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// EC curve name.
    pub crv: String,

    /// EC x coordinate (base64url encoded).
    pub x: String,

    /// EC y coordinate (base64url encoded).
    pub y: String,
}

// ============================================================================
// Header and Unverified Decoding
// ============================================================================

/// Protected JOSE header of a compact JWS.
///
/// Used for inspecting tokens without trusting them, and for assembling
/// ES512 tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Algorithm name.
    pub alg: String,

    /// Media type of the token (`JWT`, `at+jwt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Splits a compact JWS into its three segments.
fn split_compact(token: &str) -> Result<(&str, &str, &str), JwtError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(JwtError::Malformed(
            "compact JWS must have exactly three segments".to_string(),
        )),
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| JwtError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| JwtError::Malformed(e.to_string()))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, JwtError> {
    let json = serde_json::to_vec(value).map_err(|e| JwtError::Signing(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Computes the `exp` claim for a token issued at `iat` with `lifetime`.
///
/// Returns `None` when the result does not fit in an `i64`.
pub(crate) fn expiry_after(iat: i64, lifetime: Duration) -> Option<i64> {
    i64::try_from(lifetime.as_secs())
        .ok()
        .and_then(|secs| iat.checked_add(secs))
}

/// Reads the protected header without verifying anything.
///
/// # Errors
/// Returns an error if the token is not a structurally valid compact JWS.
pub fn peek_header(token: &str) -> Result<JwsHeader, JwtError> {
    let (header, _, _) = split_compact(token)?;
    decode_segment(header)
}

/// Decodes the payload without verifying the signature or any claim.
///
/// Never use the result for trust decisions.
///
/// # Errors
/// Returns an error if the token is malformed or the payload does not
/// deserialize into `T`.
pub fn decode_unverified<T: DeserializeOwned>(token: &str) -> Result<T, JwtError> {
    let (_, payload, _) = split_compact(token)?;
    decode_segment(payload)
}

// ============================================================================
// Claim Checks
// ============================================================================

/// Registered claims checked during verification, in addition to `exp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimChecks<'a> {
    /// Required `iss` value.
    pub issuer: Option<&'a str>,
    /// Required member of `aud`.
    pub audience: Option<&'a str>,
}

impl<'a> ClaimChecks<'a> {
    /// Checks only the issuer.
    #[must_use]
    pub fn issuer(issuer: &'a str) -> Self {
        Self {
            issuer: Some(issuer),
            audience: None,
        }
    }

    /// Checks only the audience.
    #[must_use]
    pub fn audience(audience: &'a str) -> Self {
        Self {
            issuer: None,
            audience: Some(audience),
        }
    }

    fn to_validation(self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        if let Some(issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Applies the same rules as [`ClaimChecks::to_validation`] to a raw payload.
    fn check(self, claims: &serde_json::Value) -> Result<(), JwtError> {
        let exp = claims
            .get("exp")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| JwtError::Claim("exp is missing".to_string()))?;
        if exp < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(JwtError::Expired);
        }

        if let Some(expected) = self.issuer {
            let iss = claims
                .get("iss")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| JwtError::Claim("iss is missing".to_string()))?;
            if iss != expected {
                return Err(JwtError::Claim("iss does not match".to_string()));
            }
        }

        if let Some(expected) = self.audience {
            let matches = match claims.get("aud") {
                Some(serde_json::Value::String(aud)) => aud == expected,
                Some(serde_json::Value::Array(auds)) => {
                    auds.iter().any(|aud| aud.as_str() == Some(expected))
                }
                Some(_) => false,
                None => return Err(JwtError::Claim("aud is missing".to_string())),
            };
            if !matches {
                return Err(JwtError::Claim("aud does not match".to_string()));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// Parses a PKCS8 private key and SPKI public key for one curve, checks that
/// they belong together, and yields `(secret, public, x, y)`.
macro_rules! parse_ec_pair {
    ($curve:ident, $name:expr, $private_pem:expr, $public_pem:expr) => {{
        use $curve::pkcs8::{DecodePrivateKey, DecodePublicKey};

        let secret = $curve::SecretKey::from_pkcs8_pem($private_pem).map_err(|e| {
            JwtError::Key(format!("private key is not a PKCS8 {} key: {}", $name, e))
        })?;
        let public = $curve::PublicKey::from_public_key_pem($public_pem).map_err(|e| {
            JwtError::Key(format!("public key is not an SPKI {} key: {}", $name, e))
        })?;
        if secret.public_key() != public {
            return Err(JwtError::Key(
                "public key does not match private key".to_string(),
            ));
        }

        let point = public.to_encoded_point(false);
        let x = point
            .x()
            .ok_or_else(|| JwtError::Key("public point has no x coordinate".to_string()))?
            .to_vec();
        let y = point
            .y()
            .ok_or_else(|| JwtError::Key("public point has no y coordinate".to_string()))?
            .to_vec();

        (secret, public, x, y)
    }};
}

/// Generates a PKCS8 private key and SPKI public key PEM for one curve.
macro_rules! generate_ec_pair {
    ($curve:ident) => {{
        use $curve::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

        let secret = $curve::SecretKey::random(&mut OsRng);
        let private_pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::Key(e.to_string()))?;
        let public_pem = secret
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::Key(e.to_string()))?;

        (private_pem.as_str().to_owned(), public_pem)
    }};
}

/// Generates a fresh key pair as `(private PKCS8 PEM, public SPKI PEM)`.
///
/// # Errors
/// Returns an error if PEM export fails.
pub fn generate_ec_pem_pair(algorithm: SigningAlgorithm) -> Result<(String, String), JwtError> {
    Ok(match algorithm {
        SigningAlgorithm::ES256 => generate_ec_pair!(p256),
        SigningAlgorithm::ES384 => generate_ec_pair!(p384),
        SigningAlgorithm::ES512 => generate_ec_pair!(p521),
    })
}

/// Algorithm-specific key handles.
enum KeyBackend {
    /// ES256 and ES384 through `jsonwebtoken`.
    Jose {
        algorithm: Algorithm,
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
    },
    /// ES512 through `p521`.
    P521 {
        signing_key: Box<p521::ecdsa::SigningKey>,
        verifying_key: Box<p521::ecdsa::VerifyingKey>,
    },
}

/// A parsed, consistency-checked signing key pair.
pub struct SigningKeyPair {
    /// Key ID.
    pub kid: String,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    backend: KeyBackend,

    /// Public point coordinates for JWKS export.
    x: Vec<u8>,
    y: Vec<u8>,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Loads a key pair from PEM strings.
    ///
    /// # Arguments
    /// * `kid` - Key ID
    /// * `algorithm` - Signing algorithm; both keys must be on its curve
    /// * `private_pem` - PKCS8 PEM private key
    /// * `public_pem` - SPKI PEM public key
    ///
    /// # Errors
    /// Returns an error if either key fails to parse under the algorithm's
    /// curve, or if the public key is not the private key's public half.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, JwtError> {
        let (backend, x, y) = match algorithm {
            SigningAlgorithm::ES256 => {
                let (_, _, x, y) = parse_ec_pair!(p256, "P-256", private_pem, public_pem);
                let backend = Self::jose_backend(Algorithm::ES256, private_pem, &x, &y)?;
                (backend, x, y)
            }
            SigningAlgorithm::ES384 => {
                let (_, _, x, y) = parse_ec_pair!(p384, "P-384", private_pem, public_pem);
                let backend = Self::jose_backend(Algorithm::ES384, private_pem, &x, &y)?;
                (backend, x, y)
            }
            SigningAlgorithm::ES512 => {
                let (secret, public, x, y) =
                    parse_ec_pair!(p521, "P-521", private_pem, public_pem);
                let signing_key = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())
                    .map_err(|e| JwtError::Key(e.to_string()))?;
                let verifying_key = p521::ecdsa::VerifyingKey::from_sec1_bytes(
                    public.to_encoded_point(false).as_bytes(),
                )
                .map_err(|e| JwtError::Key(e.to_string()))?;
                let backend = KeyBackend::P521 {
                    signing_key: Box::new(signing_key),
                    verifying_key: Box::new(verifying_key),
                };
                (backend, x, y)
            }
        };

        Ok(Self {
            kid: kid.into(),
            algorithm,
            backend,
            x,
            y,
        })
    }

    fn jose_backend(
        algorithm: Algorithm,
        private_pem: &str,
        x: &[u8],
        y: &[u8],
    ) -> Result<KeyBackend, JwtError> {
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::Key(e.to_string()))?;
        let decoding_key =
            DecodingKey::from_ec_components(&URL_SAFE_NO_PAD.encode(x), &URL_SAFE_NO_PAD.encode(y))
                .map_err(|e| JwtError::Key(e.to_string()))?;

        Ok(KeyBackend::Jose {
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// Signs claims into a compact JWS with the given `typ` header.
    ///
    /// The header always carries this key's `kid` and algorithm.
    ///
    /// # Errors
    /// Returns an error if serialization or signing fails.
    pub fn encode<T: Serialize>(&self, typ: &str, claims: &T) -> Result<String, JwtError> {
        match &self.backend {
            KeyBackend::Jose {
                algorithm,
                encoding_key,
                ..
            } => {
                let mut header = Header::new(*algorithm);
                header.typ = Some(typ.to_string());
                header.kid = Some(self.kid.clone());

                encode(&header, claims, encoding_key)
                    .map_err(|e| JwtError::Signing(e.to_string()))
            }
            KeyBackend::P521 { signing_key, .. } => {
                let header = JwsHeader {
                    alg: self.algorithm.as_str().to_string(),
                    typ: Some(typ.to_string()),
                    kid: Some(self.kid.clone()),
                };
                let signing_input =
                    format!("{}.{}", encode_segment(&header)?, encode_segment(claims)?);
                let signature: p521::ecdsa::Signature = signing_key
                    .try_sign(signing_input.as_bytes())
                    .map_err(|e| JwtError::Signing(e.to_string()))?;

                Ok(format!(
                    "{}.{}",
                    signing_input,
                    URL_SAFE_NO_PAD.encode(signature.to_bytes())
                ))
            }
        }
    }

    /// Verifies the signature and registered claims, then deserializes the payload.
    ///
    /// `exp` is always required and checked without leeway. The token's
    /// `alg` header must match this key's algorithm.
    ///
    /// # Errors
    /// Returns an error on a malformed token, bad signature, algorithm
    /// mismatch, expiry, or failed issuer/audience check.
    pub fn decode<T: DeserializeOwned>(
        &self,
        token: &str,
        checks: &ClaimChecks<'_>,
    ) -> Result<T, JwtError> {
        match &self.backend {
            KeyBackend::Jose {
                algorithm,
                decoding_key,
                ..
            } => {
                let validation = checks.to_validation(*algorithm);
                decode::<T>(token, decoding_key, &validation)
                    .map(|data| data.claims)
                    .map_err(JwtError::from)
            }
            KeyBackend::P521 { verifying_key, .. } => {
                let (header_segment, payload_segment, signature_segment) = split_compact(token)?;

                let header: JwsHeader = decode_segment(header_segment)?;
                if header.alg != self.algorithm.as_str() {
                    return Err(JwtError::Malformed(format!(
                        "alg {} does not match the key",
                        header.alg
                    )));
                }

                let signature_bytes = URL_SAFE_NO_PAD
                    .decode(signature_segment)
                    .map_err(|e| JwtError::Malformed(e.to_string()))?;
                let signature = p521::ecdsa::Signature::from_slice(&signature_bytes)
                    .map_err(|_| JwtError::InvalidSignature)?;
                let signing_input = format!("{}.{}", header_segment, payload_segment);
                verifying_key
                    .verify(signing_input.as_bytes(), &signature)
                    .map_err(|_| JwtError::InvalidSignature)?;

                let claims: serde_json::Value = decode_segment(payload_segment)?;
                checks.check(&claims)?;
                serde_json::from_value(claims).map_err(|e| JwtError::Claim(e.to_string()))
            }
        }
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "EC".to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: self.algorithm.as_str().to_string(),
            crv: self.algorithm.curve().to_string(),
            x: URL_SAFE_NO_PAD.encode(&self.x),
            y: URL_SAFE_NO_PAD.encode(&self.y),
        }
    }

    /// Returns a JWKS containing this key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        let mut jwks = Jwks::new();
        jwks.add_key(self.to_jwk());
        jwks
    }
}

// ============================================================================
// Tests
// ============================================================================
