//! Token issuance error types.
//!
//! Generation-side failures (signing disabled, misconfigured key provider,
//! cryptographic failures) and storage outages surface as [`AuthError`].
//! Validation of untrusted tokens never produces an `AuthError`; those paths
//! return `None` instead.

use std::fmt;

/// Errors that can occur while issuing, rotating, or revoking tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The requested scope exceeds the scope originally granted.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// Token signing is not configured (no key provider).
    #[error("Token signing is disabled: {message}")]
    SigningDisabled {
        /// What the caller attempted.
        message: String,
    },

    /// Loaded key material is malformed or the key pair does not match.
    #[error("Invalid signing key: {message}")]
    SigningKey {
        /// Description of the key problem.
        message: String,
    },

    /// A token could not be produced.
    ///
    /// The message is intentionally generic; the underlying cause is logged
    /// where the failure happens.
    #[error("{message}")]
    TokenGeneration {
        /// Generic, caller-safe description.
        message: String,
    },

    /// Storage backend error.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `SigningDisabled` error.
    #[must_use]
    pub fn signing_disabled(message: impl Into<String>) -> Self {
        Self::SigningDisabled {
            message: message.into(),
        }
    }

    /// Creates a new `SigningKey` error.
    #[must_use]
    pub fn signing_key(message: impl Into<String>) -> Self {
        Self::SigningKey {
            message: message.into(),
        }
    }

    /// Creates a new `TokenGeneration` error.
    #[must_use]
    pub fn token_generation(message: impl Into<String>) -> Self {
        Self::TokenGeneration {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error category, logged as the `category` field.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidScope { .. } => ErrorCategory::Authorization,
            Self::SigningDisabled { .. } => ErrorCategory::Configuration,
            Self::SigningKey { .. } => ErrorCategory::Signing,
            Self::TokenGeneration { .. } => ErrorCategory::Signing,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidScope { .. } => "invalid_scope",
            _ => "server_error",
        }
    }
}

/// Categories of errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Scope failures.
    Authorization,
    /// Key loading and signing failures.
    Signing,
    /// Storage and external service failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization => write!(f, "authorization"),
            Self::Signing => write!(f, "signing"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
