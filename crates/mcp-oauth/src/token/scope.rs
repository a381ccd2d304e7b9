//! Whitespace-delimited OAuth scope handling.

use std::collections::HashSet;

use crate::AuthResult;
use crate::error::AuthError;

/// The OpenID Connect scope.
pub const OPENID: &str = "openid";
/// Scope gating profile claims in identity tokens.
pub const PROFILE: &str = "profile";
/// Scope gating email claims in identity tokens.
pub const EMAIL: &str = "email";

/// Returns `true` if `scope` contains `name` as a whole element.
#[must_use]
pub fn has_scope(scope: Option<&str>, name: &str) -> bool {
    scope.is_some_and(|scope| scope.split_whitespace().any(|element| element == name))
}

/// Determines the scope of a refreshed grant.
///
/// Scope may be narrowed but never expanded (RFC 6749 section 6). An absent
/// or blank request keeps the original grant; otherwise every requested
/// element must appear in the original and the requested string becomes
/// the new grant.
///
/// # Errors
/// Returns `AuthError::InvalidScope` naming the first element outside the
/// original grant.
pub fn narrow_scope(original: &str, requested: Option<&str>) -> AuthResult<String> {
    let requested = match requested {
        Some(requested) if !requested.trim().is_empty() => requested,
        _ => return Ok(original.to_string()),
    };

    let original_scopes: HashSet<&str> = original.split_whitespace().collect();
    if let Some(extra) = requested
        .split_whitespace()
        .find(|element| !original_scopes.contains(element))
    {
        return Err(AuthError::invalid_scope(format!(
            "Requested scope '{}' exceeds original grant",
            extra
        )));
    }

    Ok(requested.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_scope() {
        assert!(has_scope(Some("openid profile"), PROFILE));
        assert!(has_scope(Some("  email\topenid "), EMAIL));
        assert!(!has_scope(Some("openid"), PROFILE));
        assert!(!has_scope(Some("profiles"), PROFILE));
        assert!(!has_scope(None, OPENID));
    }

    #[test]
    fn test_narrow_scope_keeps_original_without_request() {
        assert_eq!(narrow_scope("openid email", None).unwrap(), "openid email");
        assert_eq!(narrow_scope("openid email", Some("  ")).unwrap(), "openid email");
    }

    #[test]
    fn test_narrow_scope_allows_subset() {
        assert_eq!(
            narrow_scope("openid offline_access", Some("openid")).unwrap(),
            "openid"
        );
        assert_eq!(
            narrow_scope("openid offline_access", Some("offline_access openid")).unwrap(),
            "offline_access openid"
        );
    }

    #[test]
    fn test_narrow_scope_rejects_expansion() {
        let err = narrow_scope("openid", Some("openid email")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidScope { .. }));
        assert!(err.to_string().contains("email"));

        assert!(narrow_scope("", Some("openid")).is_err());
    }
}
