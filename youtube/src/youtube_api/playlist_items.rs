//! YouTube PlaylistItems API types.

use crate::youtube_api::types::PageRequest;
use serde::{Deserialize, Serialize};
use spamsweep_api::Endpoint;

/// A `playlistItem` resource: one video's entry in a playlist.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub snippet: Option<PlaylistItemSnippet>,
    #[serde(rename = "contentDetails", default)]
    pub content_details: Option<PlaylistItemContentDetails>,
    #[serde(default)]
    pub status: Option<PlaylistItemStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistItemSnippet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistItemContentDetails {
    #[serde(rename = "videoId", default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistItemStatus {
    #[serde(rename = "privacyStatus", default)]
    pub privacy_status: Option<PrivacyStatus>,
}

/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#status.privacyStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    Public,
    Private,
    Unlisted,
    /// Anything YouTube adds later.
    #[serde(other)]
    Other,
}

/// Parameters for `playlistItems.list`.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list#parameters>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItemsParams {
    pub part: Vec<&'static str>,
    pub playlist_id: String,
    /// 0 to 50.
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl PlaylistItemsParams {
    /// Everything needed to tell public uploads apart, 50 per page.
    pub fn for_playlist(playlist_id: impl Into<String>) -> Self {
        Self {
            part: vec!["id", "snippet", "contentDetails", "status"],
            playlist_id: playlist_id.into(),
            max_results: Some(50),
            page_token: None,
        }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::new("playlistItems")
            .query("part", self.part.join(","))
            .query("playlistId", &self.playlist_id)
            .query_opt("maxResults", self.max_results)
            .query_opt("pageToken", self.page_token.as_ref())
    }
}

impl PageRequest for PlaylistItemsParams {
    fn with_page_token(self, page_token: Option<String>) -> Self {
        Self { page_token, ..self }
    }
}
