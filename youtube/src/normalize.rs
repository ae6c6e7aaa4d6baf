//! Flattening raw API pages into the records the rest of the system works with.
//!
//! Everything here is pure. Missing optional text becomes an empty string; nothing here fails.

use crate::youtube_api::comments::{Comment, CommentThread};
use crate::youtube_api::playlist_items::{PlaylistItem, PrivacyStatus};
use crate::youtube_api::types::Page;
use serde::{Deserialize, Serialize};

/// A single comment, top-level or reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: String,
    pub channel_id: String,
    pub video_id: String,
    pub author_display_name: String,
    pub text_display: String,
    pub text_original: String,
    pub published_at: String,
}

/// A comment as listed from a thread page.
///
/// In nested mode a top-level comment carries its replies (when the thread had any); in flat mode
/// `replies` is always `None` and replies are siblings in the output instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRecord {
    #[serde(flatten)]
    pub comment: CommentRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<CommentRecord>>,
}

impl From<CommentRecord> for ThreadRecord {
    fn from(comment: CommentRecord) -> Self {
        Self {
            comment,
            replies: None,
        }
    }
}

/// A public upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    /// The channel the video was listed under.
    pub account_id: String,
    pub account_name: String,
}

fn or_empty(field: Option<&String>) -> String {
    field.cloned().unwrap_or_default()
}

pub fn format_comment(raw: &Comment) -> CommentRecord {
    let Some(snippet) = &raw.snippet else {
        return CommentRecord {
            id: raw.id.clone(),
            ..CommentRecord::default()
        };
    };
    CommentRecord {
        id: raw.id.clone(),
        channel_id: or_empty(snippet.channel_id.as_ref()),
        video_id: or_empty(snippet.video_id.as_ref()),
        author_display_name: or_empty(snippet.author_display_name.as_ref()),
        text_display: or_empty(snippet.text_display.as_ref()),
        text_original: or_empty(snippet.text_original.as_ref()),
        published_at: or_empty(snippet.published_at.as_ref()),
    }
}

/// Normalizes one page of comment threads.
///
/// Threads without a top-level comment are skipped. With `flat`, each thread contributes its
/// top-level comment followed by its replies as separate records; otherwise it contributes one
/// record with the replies attached. Reply order is kept either way.
pub fn parse_comment_page(page: &Page<CommentThread>, flat: bool) -> Vec<ThreadRecord> {
    let mut records = Vec::with_capacity(page.items.len());
    for thread in &page.items {
        let Some(top) = thread
            .snippet
            .as_ref()
            .and_then(|s| s.top_level_comment.as_ref())
        else {
            continue;
        };
        let base = format_comment(top);
        let replies = thread
            .replies
            .as_ref()
            .and_then(|r| r.comments.as_ref())
            .map(|comments| comments.iter().map(format_comment).collect::<Vec<_>>());

        if flat {
            records.push(ThreadRecord::from(base));
            records.extend(replies.into_iter().flatten().map(ThreadRecord::from));
        } else {
            records.push(ThreadRecord {
                comment: base,
                replies,
            });
        }
    }
    records
}

/// Normalizes one page of playlist items into public videos.
///
/// Items that aren't public, or that don't say which video they are, are dropped.
pub fn parse_video_page(
    page: &Page<PlaylistItem>,
    account_id: &str,
    account_name: &str,
) -> Vec<Video> {
    page.items
        .iter()
        .filter(|item| {
            item.status.as_ref().and_then(|s| s.privacy_status) == Some(PrivacyStatus::Public)
        })
        .filter_map(|item| {
            let id = item.content_details.as_ref()?.video_id.clone()?;
            let snippet = item.snippet.clone().unwrap_or_default();
            Some(Video {
                id,
                title: snippet.title.unwrap_or_default(),
                description: snippet.description.unwrap_or_default(),
                published_at: snippet.published_at.unwrap_or_default(),
                account_id: account_id.to_string(),
                account_name: account_name.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn comment(id: &str, text: &str) -> serde_json::Value {
        json!({
            "id": id,
            "snippet": {
                "channelId": "UC1",
                "videoId": "v1",
                "authorDisplayName": "viewer",
                "textDisplay": text,
                "textOriginal": text,
                "publishedAt": "2024-05-01T00:00:00Z"
            }
        })
    }

    fn thread_page() -> Page<CommentThread> {
        serde_json::from_value(json!({
            "items": [
                {
                    "id": "t1",
                    "snippet": {"topLevelComment": comment("c1", "first!")},
                    "replies": {"comments": [comment("c1.a", "reply a"), comment("c1.b", "reply b")]}
                },
                {"id": "t2", "snippet": {}},
                {"id": "t3", "snippet": {"topLevelComment": comment("c3", "lonely")}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn missing_text_becomes_empty() {
        let raw: Comment = serde_json::from_value(json!({
            "id": "c9",
            "snippet": {"textOriginal": "only text"}
        }))
        .unwrap();
        assert_eq!(
            format_comment(&raw),
            CommentRecord {
                id: "c9".into(),
                text_original: "only text".into(),
                ..CommentRecord::default()
            }
        );

        let bare: Comment = serde_json::from_value(json!({"id": "c10"})).unwrap();
        assert_eq!(format_comment(&bare).id, "c10");
        assert_eq!(format_comment(&bare).text_display, "");
    }

    #[test]
    fn flat_mode_emits_replies_as_siblings() {
        let records = parse_comment_page(&thread_page(), true);
        assert_eq!(
            records
                .iter()
                .map(|r| r.comment.id.as_str())
                .collect::<Vec<_>>(),
            ["c1", "c1.a", "c1.b", "c3"]
        );
        assert!(records.iter().all(|r| r.replies.is_none()));
    }

    #[test]
    fn nested_mode_attaches_replies() {
        let records = parse_comment_page(&thread_page(), false);
        assert_eq!(records.len(), 2);
        let replies = records[0].replies.as_ref().unwrap();
        assert_eq!(
            replies.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            ["c1.a", "c1.b"]
        );
        assert_eq!(replies[1].text_original, "reply b");
        assert_eq!(records[1].comment.id, "c3");
        assert_eq!(records[1].replies, None);
    }

    #[test]
    fn empty_reply_list_is_still_attached() {
        let page: Page<CommentThread> = serde_json::from_value(json!({
            "items": [{"snippet": {"topLevelComment": comment("c1", "x")}, "replies": {"comments": []}}]
        }))
        .unwrap();
        assert_eq!(parse_comment_page(&page, false)[0].replies, Some(vec![]));
    }

    #[test]
    fn nested_record_serializes_flat_with_replies() {
        let records = parse_comment_page(&thread_page(), false);
        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["id"], "c1");
        assert_eq!(value["textOriginal"], "first!");
        assert_eq!(value["replies"][0]["id"], "c1.a");
        let lonely = serde_json::to_value(&records[1]).unwrap();
        assert!(lonely.get("replies").is_none());
    }

    #[test]
    fn only_public_videos_survive() {
        let page: Page<PlaylistItem> = serde_json::from_value(json!({
            "items": [
                {
                    "snippet": {"title": "one", "description": "d1", "publishedAt": "2024-01-01T00:00:00Z"},
                    "contentDetails": {"videoId": "v1"},
                    "status": {"privacyStatus": "public"}
                },
                {
                    "snippet": {"title": "secret"},
                    "contentDetails": {"videoId": "v2"},
                    "status": {"privacyStatus": "private"}
                },
                {
                    "snippet": {"title": "three"},
                    "contentDetails": {"videoId": "v3"},
                    "status": {"privacyStatus": "public"}
                },
                {
                    "snippet": {"title": "deleted"},
                    "contentDetails": {},
                    "status": {"privacyStatus": "public"}
                }
            ]
        }))
        .unwrap();
        let videos = parse_video_page(&page, "UC1", "Cats");
        assert_eq!(
            videos,
            [
                Video {
                    id: "v1".into(),
                    title: "one".into(),
                    description: "d1".into(),
                    published_at: "2024-01-01T00:00:00Z".into(),
                    account_id: "UC1".into(),
                    account_name: "Cats".into(),
                },
                Video {
                    id: "v3".into(),
                    title: "three".into(),
                    description: String::new(),
                    published_at: String::new(),
                    account_id: "UC1".into(),
                    account_name: "Cats".into(),
                },
            ]
        );
    }
}
