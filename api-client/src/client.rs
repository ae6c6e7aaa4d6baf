//! The client itself.

use crate::cache::{InFlight, ResponseCache, Slot};
use crate::response::read_response;
use crate::{ApiConfig, ApiError, ApiResponse, AuthConfig, Body, Endpoint, Transport};
use futures::FutureExt;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-request knobs. Everything defaults to "do what the client is configured to do".
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Merged over the client's default headers.
    pub headers: HeaderMap,
    /// Overrides [`CacheSettings::enabled_by_default`](crate::CacheSettings) for this GET.
    pub use_cache: Option<bool>,
    /// Overrides the configured cache TTL for this GET.
    pub cache_ttl: Option<Duration>,
    /// Overrides the default `METHOD::url` cache and coalescing key.
    pub cache_key: Option<String>,
    /// Don't consult the token provider for this request.
    pub skip_auth: bool,
    /// Cancelling this token aborts the call just like the timeout does.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn cached(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// The parts of [`RequestOptions`] that matter once a request is actually sent.
///
/// The caller's cancellation token is not among them: a coalesced GET is shared by every caller
/// that joined it, so each caller applies its own token around its own wait.
struct Dispatch {
    headers: HeaderMap,
    skip_auth: bool,
}

struct Inner {
    config: ApiConfig,
    auth: AuthConfig,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    in_flight: InFlight,
}

/// An HTTP client with a base URL, a hard per-call timeout, typed errors, optional GET caching,
/// and coalescing of identical in-flight GETs.
///
/// Cloning is cheap and clones share the cache and the in-flight table. Construct one per
/// upstream at startup and pass it around.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.inner.config)
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_auth(config, AuthConfig::default())
    }

    pub fn with_auth(config: ApiConfig, auth: AuthConfig) -> Self {
        Self::with_transport(config, auth, reqwest::Client::new())
    }

    pub fn with_transport(config: ApiConfig, auth: AuthConfig, transport: impl Transport) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                auth,
                transport: Arc::new(transport),
                cache: ResponseCache::default(),
                in_flight: InFlight::default(),
            }),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Issues a GET.
    ///
    /// With caching on, a `200` captured less than the TTL ago is returned without touching the
    /// network. Independently of caching, a GET whose key matches one already on the wire waits
    /// for that request instead of sending its own.
    pub async fn get(
        &self,
        endpoint: impl Into<Endpoint>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = endpoint.into().url(&self.inner.config.base_url);
        let RequestOptions {
            headers,
            use_cache,
            cache_ttl,
            cache_key,
            skip_auth,
            cancel,
        } = options;
        let key = cache_key.unwrap_or_else(|| format!("{}::{url}", Method::GET));
        let use_cache = use_cache.unwrap_or(self.inner.config.cache.enabled_by_default);
        let ttl = cache_ttl.unwrap_or(self.inner.config.cache.ttl);

        if use_cache {
            if let Some(hit) = self.inner.cache.get(&key, ttl) {
                tracing::trace!(key, "serving cached response");
                return Ok(hit);
            }
        }

        let dispatch = Dispatch { headers, skip_auth };
        let inner = Arc::clone(&self.inner);
        let slot = self.inner.in_flight.join_or_start(&key, move || {
            async move { inner.send(Method::GET, url, None, dispatch).await }.boxed()
        });

        match slot {
            Slot::Follower(shared) => {
                tracing::debug!(key, "joining in-flight request");
                cancellable(shared, cancel.as_ref()).await
            }
            Slot::Leader(shared, _pending) => {
                // Other callers may still be waiting on `shared` if this one gives up.
                let response = cancellable(shared, cancel.as_ref()).await?;
                if use_cache && response.status == StatusCode::OK {
                    self.inner.cache.insert(key, response.clone(), ttl);
                }
                Ok(response)
            }
        }
    }

    pub async fn post(
        &self,
        endpoint: impl Into<Endpoint>,
        body: Option<Body>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, endpoint, body, options).await
    }

    pub async fn put(
        &self,
        endpoint: impl Into<Endpoint>,
        body: Option<Body>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::PUT, endpoint, body, options).await
    }

    pub async fn patch(
        &self,
        endpoint: impl Into<Endpoint>,
        body: Option<Body>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::PATCH, endpoint, body, options).await
    }

    pub async fn delete(
        &self,
        endpoint: impl Into<Endpoint>,
        body: Option<Body>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, endpoint, body, options).await
    }

    /// Issues a request with an arbitrary method.
    ///
    /// Body-less GETs are routed through [`Self::get`] so they share its cache.
    pub async fn request(
        &self,
        method: Method,
        endpoint: impl Into<Endpoint>,
        body: Option<Body>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        if method == Method::GET && body.is_none() {
            return self.get(endpoint, options).await;
        }
        let url = endpoint.into().url(&self.inner.config.base_url);
        let dispatch = Dispatch {
            headers: options.headers,
            skip_auth: options.skip_auth,
        };
        cancellable(
            self.inner.send(method, url, body, dispatch),
            options.cancel.as_ref(),
        )
        .await
    }

    /// Drops all cached responses, or only those whose key contains `target`.
    pub fn invalidate_cache(&self, target: Option<&str>) {
        let target = target.map(|t| Endpoint::new(t).normalized());
        self.inner.cache.invalidate(target.as_deref());
    }

    /// Forgets all in-flight requests, so the next GET for any key goes to the network.
    ///
    /// Callers already waiting on an in-flight request still get its result.
    pub fn clear_pending(&self) {
        self.inner.in_flight.clear();
    }
}

/// Waits for `call` unless `cancel` fires first, which is reported like a timeout.
async fn cancellable(
    call: impl Future<Output = Result<ApiResponse, ApiError>>,
    cancel: Option<&CancellationToken>,
) -> Result<ApiResponse, ApiError> {
    let Some(cancel) = cancel else {
        return call.await;
    };
    tokio::select! {
        result = call => result,
        () = cancel.cancelled() => {
            tracing::debug!("request cancelled by caller");
            Err(ApiError::Timeout)
        }
    }
}

impl Inner {
    /// Sends one request, bounded by the configured timeout.
    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<Body>,
        dispatch: Dispatch,
    ) -> Result<ApiResponse, ApiError> {
        let Dispatch {
            headers: extra_headers,
            skip_auth,
        } = dispatch;

        let call = async {
            let mut headers = self.config.default_headers.clone();
            headers.extend(extra_headers);
            if !skip_auth {
                self.auth.apply(&mut headers).await;
            }
            let body = body.map(|b| b.encode(&mut headers)).transpose()?;

            let parsed = reqwest::Url::parse(&url).map_err(|_| ApiError::InvalidUrl {
                url: url.clone(),
            })?;
            let mut request = reqwest::Request::new(method.clone(), parsed);
            *request.headers_mut() = headers;
            *request.body_mut() = body;

            let response = self
                .transport
                .execute(request)
                .await
                .map_err(|e| ApiError::Transport(Arc::new(e)))?;
            read_response(response).await
        };

        let result = tokio::time::timeout(self.config.timeout, call)
            .await
            .unwrap_or(Err(ApiError::Timeout));

        match &result {
            Ok(response) => {
                tracing::debug!(%method, url, status = %response.status, "request completed")
            }
            Err(e) => tracing::debug!(%method, url, error = %e, "request failed"),
        }
        result
    }
}
