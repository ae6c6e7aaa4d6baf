//! YouTube Channels API types.

use crate::youtube_api::types::PageRequest;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use spamsweep_api::Endpoint;

/// A `channel` resource contains information about a YouTube channel.
///
/// Only the parts this crate asks for are modelled; each is absent unless requested via `part`.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// The ID that YouTube uses to uniquely identify the channel.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<ChannelSnippet>,
    #[serde(
        rename = "contentDetails",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_details: Option<ChannelContentDetails>,
}

impl Channel {
    /// The playlist holding every upload of the channel.
    pub fn uploads_playlist(&self) -> Option<&str> {
        self.content_details
            .as_ref()?
            .related_playlists
            .as_ref()?
            .uploads
            .as_deref()
    }
}

/// See: <https://developers.google.com/youtube/v3/docs/channels#snippet>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSnippet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "publishedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub published_at: Option<Timestamp>,
}

/// See: <https://developers.google.com/youtube/v3/docs/channels#contentDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists", default)]
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub uploads: Option<String>,
}

/// Parameters for `channels.list`.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels/list#parameters>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelsParams {
    pub part: Vec<&'static str>,
    /// Channels owned by the authorised user.
    pub mine: bool,
    pub id: Option<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl ChannelsParams {
    pub fn mine(part: &[&'static str]) -> Self {
        Self {
            part: part.to_vec(),
            mine: true,
            id: None,
            max_results: None,
            page_token: None,
        }
    }

    pub fn by_id(id: impl Into<String>, part: &[&'static str]) -> Self {
        Self {
            part: part.to_vec(),
            mine: false,
            id: Some(id.into()),
            max_results: None,
            page_token: None,
        }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::new("channels")
            .query("part", self.part.join(","))
            .query_opt("mine", self.mine.then_some("true"))
            .query_opt("id", self.id.as_ref())
            .query_opt("maxResults", self.max_results)
            .query_opt("pageToken", self.page_token.as_ref())
    }
}

impl PageRequest for ChannelsParams {
    fn with_page_token(self, page_token: Option<String>) -> Self {
        Self { page_token, ..self }
    }
}
