use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mcp_oauth::AuthResult;
use mcp_oauth::storage::{ExpiredTokenCleanup, OAuthTokenStore, RefreshTokenReuseDetection};
use mcp_oauth::types::{TokenMetadata, UsedRefreshToken, token_prefix};
use time::OffsetDateTime;
use tracing::debug;

/// In-memory token store backed by `DashMap` indices.
///
/// - `access_tokens`: token value or JWT `jti` → record
/// - `refresh_tokens`: token value → record
/// - `used_refresh_tokens`: consumed token value → marker
///
/// Expired records are evicted lazily on lookup and in bulk by
/// [`ExpiredTokenCleanup::cleanup_expired_tokens`]. Used markers survive
/// family revocation and are only purged by cleanup.
#[derive(Debug, Default)]
pub struct InMemoryOAuthStore {
    access_tokens: DashMap<String, TokenMetadata>,
    refresh_tokens: DashMap<String, TokenMetadata>,
    used_refresh_tokens: DashMap<String, UsedRefreshToken>,
}

impl InMemoryOAuthStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored access token records, including expired ones not yet evicted.
    #[must_use]
    pub fn access_token_count(&self) -> usize {
        self.access_tokens.len()
    }

    /// Number of stored refresh token records, including expired ones not yet evicted.
    #[must_use]
    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    /// Number of remembered consumed refresh tokens.
    #[must_use]
    pub fn used_refresh_token_count(&self) -> usize {
        self.used_refresh_tokens.len()
    }
}

/// Returns the record unless it has expired, in which case it is evicted.
fn get_live(map: &DashMap<String, TokenMetadata>, key: &str) -> Option<TokenMetadata> {
    let now = OffsetDateTime::now_utc();
    if map.remove_if(key, |_, m| m.is_expired_at(now)).is_some() {
        debug!(token = token_prefix(key), "Lazy-evicted expired token");
        return None;
    }
    map.get(key).map(|entry| entry.value().clone())
}

#[async_trait::async_trait]
impl OAuthTokenStore for InMemoryOAuthStore {
    async fn store_access_token(&self, id: &str, metadata: &TokenMetadata) -> AuthResult<()> {
        self.access_tokens.insert(id.to_string(), metadata.clone());
        Ok(())
    }

    async fn get_access_token(&self, id: &str) -> AuthResult<Option<TokenMetadata>> {
        Ok(get_live(&self.access_tokens, id))
    }

    async fn remove_access_token(&self, id: &str) -> AuthResult<()> {
        self.access_tokens.remove(id);
        Ok(())
    }

    async fn store_refresh_token(&self, token: &str, metadata: &TokenMetadata) -> AuthResult<()> {
        self.refresh_tokens.insert(token.to_string(), metadata.clone());
        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> AuthResult<Option<TokenMetadata>> {
        Ok(get_live(&self.refresh_tokens, token))
    }

    async fn remove_refresh_token(&self, token: &str) -> AuthResult<()> {
        self.refresh_tokens.remove(token);
        Ok(())
    }

    fn reuse_detection(&self) -> Option<&dyn RefreshTokenReuseDetection> {
        Some(self)
    }

    fn expired_token_cleanup(&self) -> Option<&dyn ExpiredTokenCleanup> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl RefreshTokenReuseDetection for InMemoryOAuthStore {
    async fn find_used_refresh_token(&self, token: &str) -> AuthResult<Option<UsedRefreshToken>> {
        Ok(self
            .used_refresh_tokens
            .get(token)
            .map(|entry| entry.value().clone()))
    }

    async fn mark_refresh_token_as_used(
        &self,
        token: &str,
        metadata: &TokenMetadata,
    ) -> AuthResult<bool> {
        let now = OffsetDateTime::now_utc();

        // The entry guard holds the shard lock, so check and insert are atomic.
        match self.used_refresh_tokens.entry(token.to_string()) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(UsedRefreshToken {
                    family_id: metadata.family_id.clone(),
                    generation: metadata.generation,
                    used_at: now,
                    expires_at: metadata.expires_at,
                });
            }
        }

        if let Some(mut record) = self.refresh_tokens.get_mut(token) {
            record.used_at = Some(now);
        }
        Ok(true)
    }

    async fn revoke_token_family(&self, family_id: &str) -> AuthResult<u64> {
        let mut removed = 0u64;
        let mut in_family = |_: &String, m: &mut TokenMetadata| {
            let keep = m.family_id != family_id;
            if !keep {
                removed += 1;
            }
            keep
        };
        self.access_tokens.retain(&mut in_family);
        self.refresh_tokens.retain(&mut in_family);

        debug!(family_id = %family_id, removed, "Revoked token family");
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl ExpiredTokenCleanup for InMemoryOAuthStore {
    async fn cleanup_expired_tokens(&self, older_than_days: u32) -> AuthResult<u64> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(i64::from(older_than_days));
        let mut removed = 0u64;

        let mut expired_before_cutoff = |_: &String, m: &mut TokenMetadata| {
            let keep = m.expires_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        };
        self.access_tokens.retain(&mut expired_before_cutoff);
        self.refresh_tokens.retain(&mut expired_before_cutoff);

        self.used_refresh_tokens.retain(|_, marker| {
            let keep = marker.expires_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });

        debug!(removed, older_than_days, "Cleaned up expired tokens");
        Ok(removed)
    }
}
