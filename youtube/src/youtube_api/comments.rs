//! YouTube comment and comment thread resources.

use crate::youtube_api::types::PageRequest;
use serde::{Deserialize, Serialize};
use spamsweep_api::Endpoint;

/// A `commentThread` resource: a top-level comment and (some of) its replies.
///
/// See: <https://developers.google.com/youtube/v3/docs/commentThreads#resource>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentThread {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub snippet: Option<CommentThreadSnippet>,
    /// Only present when `part` includes `replies` and the thread has any.
    #[serde(default)]
    pub replies: Option<CommentThreadReplies>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentThreadSnippet {
    #[serde(rename = "channelId", default)]
    pub channel_id: Option<String>,
    #[serde(rename = "videoId", default)]
    pub video_id: Option<String>,
    #[serde(rename = "topLevelComment", default)]
    pub top_level_comment: Option<Comment>,
    #[serde(rename = "totalReplyCount", default)]
    pub total_reply_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentThreadReplies {
    #[serde(default)]
    pub comments: Option<Vec<Comment>>,
}

/// A `comment` resource.
///
/// Every textual field but the ID is optional upstream.
///
/// See: <https://developers.google.com/youtube/v3/docs/comments#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<CommentSnippet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentSnippet {
    #[serde(rename = "channelId", default)]
    pub channel_id: Option<String>,
    #[serde(rename = "videoId", default)]
    pub video_id: Option<String>,
    #[serde(rename = "authorDisplayName", default)]
    pub author_display_name: Option<String>,
    #[serde(rename = "textDisplay", default)]
    pub text_display: Option<String>,
    #[serde(rename = "textOriginal", default)]
    pub text_original: Option<String>,
    /// Kept verbatim; it is passed through, never interpreted.
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
}

/// The order comment threads are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommentOrder {
    /// Newest first.
    Time,
    Relevance,
}

impl CommentOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentOrder::Time => "time",
            CommentOrder::Relevance => "relevance",
        }
    }
}

/// Parameters for `commentThreads.list`.
///
/// See: <https://developers.google.com/youtube/v3/docs/commentThreads/list#parameters>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentThreadsParams {
    pub part: Vec<&'static str>,
    pub all_threads_related_to_channel_id: Option<String>,
    pub video_id: Option<String>,
    /// 1 to 100.
    pub max_results: Option<u32>,
    pub order: Option<CommentOrder>,
    pub page_token: Option<String>,
}

impl CommentThreadsParams {
    /// Every thread on every video of `channel_id`, newest first, with replies, 100 per page.
    pub fn for_channel(channel_id: impl Into<String>) -> Self {
        Self {
            part: vec!["snippet", "replies"],
            all_threads_related_to_channel_id: Some(channel_id.into()),
            video_id: None,
            max_results: Some(100),
            order: Some(CommentOrder::Time),
            page_token: None,
        }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::new("commentThreads")
            .query("part", self.part.join(","))
            .query_opt(
                "allThreadsRelatedToChannelId",
                self.all_threads_related_to_channel_id.as_ref(),
            )
            .query_opt("videoId", self.video_id.as_ref())
            .query_opt("maxResults", self.max_results)
            .query_opt("order", self.order.map(CommentOrder::as_str))
            .query_opt("pageToken", self.page_token.as_ref())
    }
}

impl PageRequest for CommentThreadsParams {
    fn with_page_token(self, page_token: Option<String>) -> Self {
        Self { page_token, ..self }
    }
}

/// What a moderator can do with a comment.
///
/// See: <https://developers.google.com/youtube/v3/docs/comments/setModerationStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModerationStatus {
    HeldForReview,
    Published,
    /// Hide the comment from the public. This is how spam is removed.
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ModerationStatus::HeldForReview => "heldForReview",
            ModerationStatus::Published => "published",
            ModerationStatus::Rejected => "rejected",
        }
    }
}
