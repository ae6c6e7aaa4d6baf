//! Core YouTube API client functionality and authentication management.

use crate::error::AccountError;
use crate::normalize::{ThreadRecord, Video, parse_comment_page, parse_video_page};
use crate::oauth::TokenRefresher;
use crate::pagination::paginate_list;
use crate::store::{CredentialRecord, CredentialStore, TokenUpdate};
use crate::youtube_api::{
    channels::{Channel, ChannelsParams},
    comments::{CommentThread, CommentThreadsParams, ModerationStatus},
    playlist_items::{PlaylistItem, PlaylistItemsParams},
    types::{Page, PageRequest, PagedStream},
};
use eyre::Context;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Method, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use spamsweep_api::{ApiClient, ApiConfig, ApiError, AuthConfig, Body, Endpoint, RequestOptions};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tracing::instrument;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// How many comment IDs `comments.setModerationStatus` accepts per call.
pub const MODERATION_BATCH_SIZE: usize = 100;

/// Access tokens are refreshed this long before they actually expire.
const EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Settings shared by every [`YouTubeClient`] built through [`YouTubeClient::connect`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_base_url: String,
    /// Upper bound on each API call.
    pub timeout: Duration,
    pub moderation_batch_size: usize,
    /// Connection pool shared by all clients.
    pub http: reqwest::Client,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            timeout: spamsweep_api::DEFAULT_TIMEOUT,
            moderation_batch_size: MODERATION_BATCH_SIZE,
            http: reqwest::Client::new(),
        }
    }
}

impl ClientOptions {
    /// A fresh HTTP wrapper pointed at the YouTube API.
    ///
    /// Each account gets its own, so cached or coalesced responses never cross accounts.
    pub fn api_client(&self) -> ApiClient {
        ApiClient::with_transport(
            ApiConfig::new(&self.api_base_url).with_timeout(self.timeout),
            AuthConfig::default(),
            self.http.clone(),
        )
    }
}

fn now_ms() -> i64 {
    jiff::Timestamp::now().as_millisecond()
}

/// An access token together with what is needed to replace it.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    access_token: String,
    refresh_token: String,
    /// Milliseconds since the Unix epoch. Unknown expiry means "refresh only when rejected".
    expiry_ms: Option<i64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("expiry_ms", &self.expiry_ms)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiry_ms: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expiry_ms,
        }
    }

    pub fn from_record(record: &CredentialRecord) -> Self {
        Self::new(
            record.access_token.clone(),
            record.refresh_token.clone(),
            record.expiry_ms,
        )
    }

    /// Whether the token expires within the safety buffer at `now_ms`.
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        self.expiry_ms
            .is_some_and(|expiry_ms| now_ms >= expiry_ms.saturating_sub(EXPIRY_BUFFER_MS))
    }

    pub fn expiry_ms(&self) -> Option<i64> {
        self.expiry_ms
    }

    /// Refreshes this token, preserving the refresh token if the server doesn't send a new one.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token was successfully refreshed
    /// * `Ok(false)` - The refresh token was rejected
    /// * `Err(_)` - Network or other error occurred
    pub async fn refresh(&mut self, refresher: &dyn TokenRefresher) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        let Some(new_token) = refresher
            .refresh(&self.refresh_token)
            .await
            .context("refresh OAuth token")?
        else {
            return Ok(false);
        };
        if new_token.access_token.is_empty() {
            tracing::warn!("token endpoint returned no access token");
            return Ok(false);
        }

        self.access_token = new_token.access_token;
        self.expiry_ms = new_token.expiry_ms;
        match new_token.refresh_token.filter(|t| !t.is_empty()) {
            Some(refresh_token) => {
                tracing::debug!("new token includes refresh token");
                self.refresh_token = refresh_token;
            }
            None => tracing::trace!("new token lacks refresh token, preserving original"),
        }
        Ok(true)
    }

    /// What the credential store should learn about this token.
    pub fn update(&self) -> TokenUpdate {
        TokenUpdate {
            access_token: self.access_token.clone(),
            expiry_ms: self.expiry_ms,
        }
    }

    pub fn into_record(
        self,
        account_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> CredentialRecord {
        CredentialRecord {
            account_id: account_id.into(),
            user_id: user_id.into(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry_ms: self.expiry_ms,
        }
    }
}

/// Called after every successful refresh with the new access token and expiry.
pub type OnTokenRefreshed =
    Arc<dyn Fn(TokenUpdate) -> BoxFuture<'static, eyre::Result<()>> + Send + Sync>;

/// Client for the YouTube Data API v3, bound to one linked channel.
///
/// Access tokens are refreshed automatically: ahead of time when the expiry is known, and once
/// after a `401`, in which case the rejected request is retried a single time. Clones share the
/// token.
#[derive(Clone)]
pub struct YouTubeClient {
    account_id: String,
    token: Arc<Mutex<AccessToken>>,
    refresher: Arc<dyn TokenRefresher>,
    on_token_refreshed: Option<OnTokenRefreshed>,
    api: ApiClient,
    moderation_batch_size: usize,
}

impl fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("account_id", &self.account_id)
            .field("api", &self.api)
            .field("moderation_batch_size", &self.moderation_batch_size)
            .finish_non_exhaustive()
    }
}

impl YouTubeClient {
    pub fn new(
        account_id: impl Into<String>,
        token: AccessToken,
        refresher: Arc<dyn TokenRefresher>,
        api: ApiClient,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            token: Arc::new(Mutex::new(token)),
            refresher,
            on_token_refreshed: None,
            api,
            moderation_batch_size: MODERATION_BATCH_SIZE,
        }
    }

    pub fn with_moderation_batch_size(mut self, batch_size: usize) -> Self {
        self.moderation_batch_size = batch_size;
        self
    }

    pub fn on_token_refreshed(mut self, callback: OnTokenRefreshed) -> Self {
        self.on_token_refreshed = Some(callback);
        self
    }

    /// Builds a client for a linked account.
    ///
    /// Fails with [`AccountError::NotLinked`] before touching the network if the store has no
    /// credentials for `account_id`. Refreshed tokens are written back to `store` under
    /// `account_id`.
    #[instrument(skip(store, refresher, options))]
    pub async fn connect(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        account_id: &str,
        options: &ClientOptions,
    ) -> eyre::Result<Self> {
        let record = store
            .find(account_id)
            .await
            .context("look up linked account")?
            .ok_or_else(|| AccountError::NotLinked {
                account_id: account_id.to_string(),
            })?;

        let account_key = account_id.to_string();
        let persist: OnTokenRefreshed = Arc::new(move |update: TokenUpdate| {
            let store = Arc::clone(&store);
            let account_key = account_key.clone();
            async move { store.update_tokens(&account_key, update).await }.boxed()
        });

        Ok(Self::new(
            account_id,
            AccessToken::from_record(&record),
            refresher,
            options.api_client(),
        )
        .with_moderation_batch_size(options.moderation_batch_size)
        .on_token_refreshed(persist))
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns a snapshot of the current token.
    pub async fn token(&self) -> AccessToken {
        self.token.lock().await.clone()
    }

    /// Gets an access token that isn't about to expire, refreshing if necessary.
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;
        if token.needs_refresh(now_ms()) {
            tracing::debug!("access token expired, attempting refresh");
            self.refresh_locked(&mut token).await?;
        }
        Ok(token.access_token.clone())
    }

    /// Replaces an access token the API just rejected.
    ///
    /// If another caller already replaced it while this one was waiting for the lock, their token
    /// is used instead of refreshing a second time.
    async fn replace_rejected(&self, rejected: &str) -> eyre::Result<String> {
        let mut token = self.token.lock().await;
        if token.access_token == rejected {
            self.refresh_locked(&mut token).await?;
        }
        Ok(token.access_token.clone())
    }

    async fn refresh_locked(&self, token: &mut AccessToken) -> eyre::Result<()> {
        if !token.refresh(self.refresher.as_ref()).await? {
            tracing::error!("refresh token was rejected, account has to be linked again");
            return Err(AccountError::RefreshRejected {
                account_id: self.account_id.clone(),
            }
            .into());
        }
        tracing::debug!("access token successfully refreshed");

        if let Some(on_token_refreshed) = &self.on_token_refreshed {
            if let Err(e) = on_token_refreshed(token.update()).await {
                // The new token is still good for this process.
                tracing::warn!(error = %e, "failed to persist refreshed access token");
            }
        }
        Ok(())
    }

    /// Makes an authenticated request and parses the JSON response.
    ///
    /// A `401` triggers one refresh and one retry. Failures keep the underlying [`ApiError`]
    /// reachable through [`eyre::Report::downcast_ref`].
    #[instrument(skip(self, body), fields(account_id = %self.account_id), level = tracing::Level::TRACE)]
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: Endpoint,
        body: Option<Body>,
    ) -> eyre::Result<T> {
        let access_token = self.fresh_access_token().await?;
        let first = self
            .api
            .request(
                method.clone(),
                endpoint.clone(),
                body.clone(),
                bearer(&access_token)?,
            )
            .await;

        let response = match first {
            Err(ApiError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED => {
                tracing::debug!("access token was rejected, refreshing and retrying");
                let access_token = self.replace_rejected(&access_token).await?;
                self.api
                    .request(method.clone(), endpoint.clone(), body, bearer(&access_token)?)
                    .await
            }
            other => other,
        };

        let response = response
            .with_context(|| format!("{method} request to YouTube API: {}", endpoint.resolve()))?;
        response
            .json()
            .with_context(|| format!("parse YouTube API response: {}", endpoint.resolve()))
    }

    /// Fetches one page of comment threads.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/commentThreads/list>
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub async fn list_comment_threads(
        &self,
        params: CommentThreadsParams,
    ) -> eyre::Result<Page<CommentThread>> {
        let page: Page<CommentThread> = self
            .call(Method::GET, params.endpoint(), None)
            .await
            .context("list comment threads")?;
        tracing::debug!(
            returned_items = page.items.len(),
            has_next_page = page.next_cursor().is_some(),
            "fetched comment threads"
        );
        Ok(page)
    }

    /// Fetches one page of channels.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub async fn list_channels(&self, params: ChannelsParams) -> eyre::Result<Page<Channel>> {
        let page: Page<Channel> = self
            .call(Method::GET, params.endpoint(), None)
            .await
            .context("list channels")?;
        tracing::debug!(returned_items = page.items.len(), "fetched channels");
        Ok(page)
    }

    /// Fetches one page of playlist items.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub async fn list_playlist_items(
        &self,
        params: PlaylistItemsParams,
    ) -> eyre::Result<Page<PlaylistItem>> {
        let page: Page<PlaylistItem> = self
            .call(Method::GET, params.endpoint(), None)
            .await
            .context("list playlist items")?;
        tracing::debug!(returned_items = page.items.len(), "fetched playlist items");
        Ok(page)
    }

    /// Returns a paginated stream of the channels owned by the authorised user.
    pub fn list_my_channels(&self) -> impl Stream<Item = eyre::Result<Channel>> + use<'_> {
        PagedStream::new(move |page_token| async move {
            let params = ChannelsParams::mine(&["id", "snippet", "contentDetails"])
                .with_page_token(page_token);
            let page = self.list_channels(params).await?;
            Ok::<_, eyre::Report>((VecDeque::from(page.items), page.next_page_token))
        })
    }

    /// Sets the moderation status of every comment in `comment_ids`.
    ///
    /// IDs are sent in batches of at most the configured batch size, one call at a time, and the
    /// first failing batch stops the run. Returns how many comments were updated.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/comments/setModerationStatus>
    #[instrument(skip(self, comment_ids), fields(account_id = %self.account_id, comments = comment_ids.len()))]
    pub async fn set_moderation_status(
        &self,
        comment_ids: &[String],
        status: ModerationStatus,
    ) -> eyre::Result<usize> {
        let mut batches = 0;
        for batch in comment_ids.chunks(self.moderation_batch_size.max(1)) {
            let endpoint = Endpoint::new("comments/setModerationStatus")
                .query("id", batch.join(","))
                .query("moderationStatus", status.as_str());
            let _: IgnoredAny = self
                .call(Method::POST, endpoint, None)
                .await
                .with_context(|| format!("set moderation status of {} comments", batch.len()))?;
            batches += 1;
        }
        tracing::debug!(batches, "moderation status set");
        Ok(comment_ids.len())
    }

    /// Every comment on every video of `channel_id`, newest thread first.
    ///
    /// See [`parse_comment_page`] for what `flat` does.
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub async fn comment_threads_for_channel(
        &self,
        channel_id: &str,
        flat: bool,
    ) -> eyre::Result<Vec<ThreadRecord>> {
        paginate_list(
            |params| self.list_comment_threads(params),
            CommentThreadsParams::for_channel(channel_id),
            |page| parse_comment_page(&page, flat),
        )
        .await
    }

    /// The public uploads of the authorised channel.
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub async fn my_videos(&self) -> eyre::Result<Vec<Video>> {
        let channels = self
            .list_channels(ChannelsParams::mine(&["contentDetails", "snippet"]))
            .await?;
        let Some(channel) = channels.items.first() else {
            tracing::debug!("authorised user has no channel");
            return Ok(Vec::new());
        };
        let Some(uploads) = channel.uploads_playlist() else {
            tracing::debug!(channel_id = %channel.id, "channel has no uploads playlist");
            return Ok(Vec::new());
        };
        let account_name = channel
            .snippet
            .as_ref()
            .map(|s| s.title.as_str())
            .unwrap_or_default();

        paginate_list(
            |params| self.list_playlist_items(params),
            PlaylistItemsParams::for_playlist(uploads),
            |page| parse_video_page(&page, &self.account_id, account_name),
        )
        .await
    }
}

fn bearer(access_token: &str) -> eyre::Result<RequestOptions> {
    let mut value = HeaderValue::from_str(&format!("Bearer {access_token}"))
        .context("access token is not a valid header value")?;
    value.set_sensitive(true);
    Ok(RequestOptions::default().header(AUTHORIZATION, value))
}
