//! Opt-in token reuse keyed by tenant.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::{AccessToken, TokenProvider};
use crate::config::TenantContext;
use crate::error::AuthError;

/// Wraps a [`TokenProvider`] and reuses tokens until they near expiry.
///
/// Tokens without a known expiry are never cached.
pub struct CachedTokenProvider<P> {
    inner: P,
    refresh_before: Duration,
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl<P: TokenProvider> CachedTokenProvider<P> {
    /// A margin too large to represent disables reuse.
    pub fn new(inner: P, refresh_before_seconds: u64) -> Self {
        let refresh_before = i64::try_from(refresh_before_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Self {
            inner,
            refresh_before,
            tokens: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for CachedTokenProvider<P> {
    async fn acquire_token(&self, tenant: &TenantContext) -> Result<AccessToken, AuthError> {
        let mut tokens = self.tokens.lock().await;

        if let Some(cached) = tokens.get(&tenant.tenant_id) {
            if let Some(expires_at) = cached.expires_at() {
                if expires_at.signed_duration_since(Utc::now()) > self.refresh_before {
                    debug!(
                        "Reusing cached token for {} (expires at {})",
                        tenant.tenant_id, expires_at
                    );
                    return Ok(cached.clone());
                }
            }
        }

        let token = self.inner.acquire_token(tenant).await?;

        match token.expires_at() {
            Some(expires_at) => {
                info!("Token acquired for {}, expires at {}", tenant.tenant_id, expires_at);
                tokens.insert(tenant.tenant_id.clone(), token.clone());
            }
            None => {
                tokens.remove(&tenant.tenant_id);
            }
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure::SecureString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Issues `tok-1`, `tok-2`, ... each valid for `lifetime`.
    struct Counting {
        calls: AtomicUsize,
        lifetime: Option<Duration>,
    }

    impl Counting {
        fn new(lifetime: Option<Duration>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                lifetime,
            }
        }
    }

    #[async_trait]
    impl TokenProvider for Counting {
        async fn acquire_token(&self, _tenant: &TenantContext) -> Result<AccessToken, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(
                format!("tok-{n}"),
                self.lifetime.map(|l| Utc::now() + l),
            ))
        }
    }

    fn tenant(id: &str) -> TenantContext {
        TenantContext {
            tenant_id: id.into(),
            client_id: "client".into(),
            client_secret: SecureString::new("secret"),
            authority_endpoint: "https://login.microsoftonline.com/".into(),
            resource_id: "https://graph.windows.net/".into(),
            api_base_url: "https://graph.windows.net/".into(),
            api_version: "1.6".into(),
        }
    }

    #[tokio::test]
    async fn test_reuses_fresh_token() {
        let cache = CachedTokenProvider::new(Counting::new(Some(Duration::hours(1))), 300);
        let contoso = tenant("contoso");

        let first = cache.acquire_token(&contoso).await.unwrap();
        let second = cache.acquire_token(&contoso).await.unwrap();

        assert_eq!(first.secret(), "tok-1");
        assert_eq!(second.secret(), "tok-1");
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reacquires_near_expiry() {
        // Lifetime shorter than the refresh margin
        let cache = CachedTokenProvider::new(Counting::new(Some(Duration::minutes(2))), 300);
        let contoso = tenant("contoso");

        cache.acquire_token(&contoso).await.unwrap();
        let second = cache.acquire_token(&contoso).await.unwrap();

        assert_eq!(second.secret(), "tok-2");
    }

    #[tokio::test]
    async fn test_unknown_expiry_not_cached() {
        let cache = CachedTokenProvider::new(Counting::new(None), 300);
        let contoso = tenant("contoso");

        cache.acquire_token(&contoso).await.unwrap();
        cache.acquire_token(&contoso).await.unwrap();

        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keyed_by_tenant() {
        let cache = CachedTokenProvider::new(Counting::new(Some(Duration::hours(1))), 300);

        let a = cache.acquire_token(&tenant("contoso")).await.unwrap();
        let b = cache.acquire_token(&tenant("fabrikam")).await.unwrap();

        assert_ne!(a.secret(), b.secret());
    }

    #[tokio::test]
    async fn test_oversized_margin_disables_reuse() {
        let cache = CachedTokenProvider::new(Counting::new(Some(Duration::hours(1))), u64::MAX);
        let contoso = tenant("contoso");

        cache.acquire_token(&contoso).await.unwrap();
        cache.acquire_token(&contoso).await.unwrap();

        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }
}
