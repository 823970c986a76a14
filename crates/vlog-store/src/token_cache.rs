//! Access token cache for the document API.
//!
//! - Refresh margin so tokens do not expire mid-request
//! - Single-flight refresh under the write lock
//! - Falls back to a still-usable token when refresh fails
//! - Static tokens for the local emulator

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the provider reports an expiry we cannot convert.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

pub struct TokenCache {
    source: TokenSource,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: TokenSource::Provider(auth),
            cache: RwLock::new(None),
        }
    }

    /// Cache that always hands out the same token (emulator "owner" token).
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            cache: RwLock::new(None),
        }
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn get_token(&self) -> StoreResult<String> {
        let auth = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Provider(auth) => auth,
        };

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.access_token.clone());
        }

        match auth.token(&[DATASTORE_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                let now = Utc::now();
                let exp = token.expires_at();
                let expires_at = if exp > now {
                    (exp - now)
                        .to_std()
                        .map(|ttl| Instant::now() + ttl)
                        .unwrap_or_else(|_| Instant::now() + TOKEN_DEFAULT_TTL)
                } else {
                    Instant::now()
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });
                debug!("Refreshed document API token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref().filter(|c| c.is_usable()) {
                    warn!(error = %e, "Token refresh failed, using existing token");
                    return Ok(cached.access_token.clone());
                }
                Err(StoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_margin_is_shorter_than_ttl() {
        assert!(TOKEN_REFRESH_MARGIN < TOKEN_DEFAULT_TTL);
    }

    #[tokio::test]
    async fn test_fixed_token_survives_invalidate() {
        let cache = TokenCache::fixed("owner");
        assert_eq!(cache.get_token().await.unwrap(), "owner");
        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "owner");
    }
}
