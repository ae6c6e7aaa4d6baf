//! YouTube Data API v3 client library.
//!
//! Covers what a comment-moderation sweep needs: listing comment threads, channels and playlist
//! items, and setting the moderation status of comments in bulk.
//!
//! Every list endpoint deserializes into a [`Page`], and every parameter type implements
//! [`PageRequest`], so all of them can be drained with
//! [`paginate_list`](crate::pagination::paginate_list) or streamed with [`PagedStream`].
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use spamsweep_youtube::store::JsonFileStore;
//! use spamsweep_youtube::oauth::{OAuthConfig, OAuthManager};
//! use spamsweep_youtube::youtube_api::{ClientOptions, YouTubeClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> eyre::Result<()> {
//! let store = Arc::new(JsonFileStore::open("spamsweep.json").await?);
//! let oauth = Arc::new(OAuthManager::new(OAuthConfig {
//!     client_id: "client-id".into(),
//!     client_secret: "client-secret".into(),
//!     redirect_uri: None,
//! })?);
//! let client =
//!     YouTubeClient::connect(store, oauth, "UCxyz", &ClientOptions::default()).await?;
//!
//! for comment in client.comment_threads_for_channel("UCxyz", true).await? {
//!     println!("{}: {}", comment.comment.author_display_name, comment.comment.text_original);
//! }
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod client;
pub mod comments;
pub mod playlist_items;
pub mod types;

pub use client::{
    AccessToken, ClientOptions, DEFAULT_API_BASE, MODERATION_BATCH_SIZE, OnTokenRefreshed,
    YouTubeClient,
};
pub use types::{Page, PageInfo, PageRequest, PagedStream};

pub use channels::{Channel, ChannelSnippet, ChannelsParams};
pub use comments::{
    Comment, CommentOrder, CommentSnippet, CommentThread, CommentThreadsParams, ModerationStatus,
};
pub use playlist_items::{PlaylistItem, PlaylistItemsParams, PrivacyStatus};
