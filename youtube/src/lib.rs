//! Finding and removing keyword spam in the comments of linked YouTube channels.
//!
//! The pieces, bottom-up:
//!
//! - [`store`]: where linked-account credentials and per-user keywords live.
//! - [`oauth`]: Google OAuth, both for linking a channel and for refreshing its access token.
//! - [`youtube_api`]: a [`YouTubeClient`] per linked channel that refreshes its own token and
//!   writes refreshed tokens back to the store.
//! - [`pagination`]: draining any cursor-paginated list endpoint into one `Vec`.
//! - [`normalize`]: turning raw comment-thread and playlist pages into flat records.
//! - [`sweep`]: running scans and rejections across many accounts at once.

pub mod config;
pub mod error;
pub mod link;
pub mod normalize;
pub mod oauth;
pub mod pagination;
pub mod store;
pub mod sweep;
pub mod youtube_api;

pub use error::AccountError;
pub use link::link_account;
pub use normalize::{CommentRecord, ThreadRecord, Video, format_comment, parse_comment_page};
pub use pagination::{PaginateOptions, paginate_list, paginate_list_with};
pub use youtube_api::{ClientOptions, YouTubeClient};
