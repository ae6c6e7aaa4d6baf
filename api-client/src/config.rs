//! Client and authentication configuration.

use async_trait::async_trait;
use http::header::{ACCEPT, AUTHORIZATION};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(60_000);

/// Configuration for an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Prepended to every relative endpoint.
    pub base_url: String,
    /// Sent with every request; per-request headers win on conflict.
    pub default_headers: HeaderMap,
    /// Upper bound on each call, from sending the request to reading the whole body.
    pub timeout: Duration,
    pub cache: CacheSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            base_url: String::new(),
            default_headers,
            timeout: DEFAULT_TIMEOUT,
            cache: CacheSettings::default(),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn with_cache(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }
}

/// GET response caching.
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    /// How long a cached `200` stays fresh.
    pub ttl: Duration,
    /// Whether GETs consult the cache when the request does not say.
    pub enabled_by_default: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            enabled_by_default: false,
        }
    }
}

/// Source of bearer tokens for outgoing requests.
///
/// Returning `Ok(None)` (or an empty token) means "send this request without a token".
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;
}

/// A [`TokenProvider`] that always hands out the same token.
#[derive(Clone)]
pub struct StaticToken(pub String);

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Some(self.0.clone()))
    }
}

/// How (and whether) requests get a token attached.
#[derive(Clone)]
pub struct AuthConfig {
    pub token_provider: Option<Arc<dyn TokenProvider>>,
    pub token_header: HeaderName,
    /// Prepended to the token with a single space. May be empty.
    pub token_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_provider: None,
            token_header: AUTHORIZATION,
            token_prefix: "Bearer".to_string(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_provider", &self.token_provider.is_some())
            .field("token_header", &self.token_header)
            .field("token_prefix", &self.token_prefix)
            .finish()
    }
}

impl AuthConfig {
    pub fn with_provider(provider: impl TokenProvider + 'static) -> Self {
        Self {
            token_provider: Some(Arc::new(provider)),
            ..Self::default()
        }
    }

    /// Best-effort token injection.
    ///
    /// A provider that fails or yields nothing leaves `headers` untouched; the failure is logged
    /// and the request goes out unauthenticated.
    pub(crate) async fn apply(&self, headers: &mut HeaderMap) {
        let Some(provider) = &self.token_provider else {
            return;
        };
        let token = match provider.token().await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(error = %e, "failed to resolve auth token");
                return;
            }
        };
        let value = if self.token_prefix.is_empty() {
            token
        } else {
            format!("{} {token}", self.token_prefix).trim().to_string()
        };
        match HeaderValue::from_str(&value) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(self.token_header.clone(), value);
            }
            Err(e) => tracing::warn!(error = %e, "auth token is not a valid header value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl TokenProvider for Failing {
        async fn token(&self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
            Err("token store offline".into())
        }
    }

    #[tokio::test]
    async fn static_token_is_prefixed() {
        let auth = AuthConfig::with_provider(StaticToken("abc".into()));
        let mut headers = HeaderMap::new();
        auth.apply(&mut headers).await;
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[tokio::test]
    async fn custom_header_without_prefix() {
        let auth = AuthConfig {
            token_header: HeaderName::from_static("x-api-key"),
            token_prefix: String::new(),
            ..AuthConfig::with_provider(StaticToken("k".into()))
        };
        let mut headers = HeaderMap::new();
        auth.apply(&mut headers).await;
        assert_eq!(headers.get("x-api-key").unwrap(), "k");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn failing_or_empty_provider_is_skipped() {
        let mut headers = HeaderMap::new();
        AuthConfig::with_provider(Failing).apply(&mut headers).await;
        AuthConfig::with_provider(StaticToken(String::new()))
            .apply(&mut headers)
            .await;
        assert!(headers.is_empty());
    }

    #[test]
    fn defaults() {
        let config = ApiConfig::new("http://localhost:3000");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert!(!config.cache.enabled_by_default);
        assert_eq!(config.default_headers.get(ACCEPT).unwrap(), "application/json");
    }
}
