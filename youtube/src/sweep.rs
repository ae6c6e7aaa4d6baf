//! Running the same operation across many linked accounts at once.
//!
//! Every account gets its own client and its own outcome. All accounts are started together and
//! awaited together; one account failing never cancels or affects another.

use crate::normalize::CommentRecord;
use crate::oauth::TokenRefresher;
use crate::store::{CredentialRecord, CredentialStore, KeywordStore};
use crate::youtube_api::{ClientOptions, ModerationStatus, YouTubeClient};
use eyre::Context;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

/// What happened for one account.
#[derive(Debug)]
pub struct AccountOutcome<T> {
    pub account_id: String,
    pub result: eyre::Result<T>,
}

/// What a scan of one account's channel found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub account_id: String,
    pub user_id: String,
    /// Comments and replies scanned.
    pub detection_count: usize,
    /// How many of those matched a keyword; the length of `spam`.
    pub spam_count: usize,
    pub spam: Vec<CommentRecord>,
}

/// Whether `text` contains any of `keywords`, case-sensitively. Empty keywords never match.
pub fn matches_keyword(text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && text.contains(keyword.as_str()))
}

#[tracing::instrument(skip_all, fields(account_id = %account.account_id))]
async fn scan_account(
    store: Arc<dyn CredentialStore>,
    keywords: &dyn KeywordStore,
    refresher: Arc<dyn TokenRefresher>,
    options: &ClientOptions,
    account: &CredentialRecord,
) -> eyre::Result<ScanReport> {
    let client = YouTubeClient::connect(store, refresher, &account.account_id, options).await?;
    let comments = client
        .comment_threads_for_channel(&account.account_id, true)
        .await?;
    let keywords = keywords
        .keywords(&account.user_id)
        .await
        .context("load spam keywords")?;

    let detection_count = comments.len();
    let spam: Vec<_> = comments
        .into_iter()
        .map(|thread| thread.comment)
        .filter(|comment| matches_keyword(&comment.text_original, &keywords))
        .collect();
    tracing::info!(scanned = detection_count, spam = spam.len(), "scanned channel");
    Ok(ScanReport {
        account_id: account.account_id.clone(),
        user_id: account.user_id.clone(),
        detection_count,
        spam_count: spam.len(),
        spam,
    })
}

/// Scans every comment on each account's channel for that account owner's keywords.
///
/// A channel whose owner has no keywords is still drained, so its scanned count is reported.
pub async fn scan_accounts(
    store: Arc<dyn CredentialStore>,
    keywords: &dyn KeywordStore,
    refresher: Arc<dyn TokenRefresher>,
    options: &ClientOptions,
    accounts: &[CredentialRecord],
) -> Vec<AccountOutcome<ScanReport>> {
    join_all(accounts.iter().map(|account| {
        let store = Arc::clone(&store);
        let refresher = Arc::clone(&refresher);
        async move {
            let result = scan_account(store, keywords, refresher, options, account).await;
            if let Err(e) = &result {
                tracing::warn!(account_id = %account.account_id, error = ?e, "scan failed");
            }
            AccountOutcome {
                account_id: account.account_id.clone(),
                result,
            }
        }
    }))
    .await
}

/// Rejects the given comments, grouped by the account whose channel they are on.
///
/// Each outcome carries the number of comments rejected for that account.
pub async fn reject_comments(
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    options: &ClientOptions,
    batches: Vec<(String, Vec<String>)>,
) -> Vec<AccountOutcome<usize>> {
    join_all(batches.into_iter().map(|(account_id, comment_ids)| {
        let store = Arc::clone(&store);
        let refresher = Arc::clone(&refresher);
        async move {
            let result = async {
                let client = YouTubeClient::connect(store, refresher, &account_id, options).await?;
                client
                    .set_moderation_status(&comment_ids, ModerationStatus::Rejected)
                    .await
            }
            .await;
            match &result {
                Ok(rejected) => tracing::info!(%account_id, rejected, "rejected spam"),
                Err(e) => tracing::warn!(%account_id, error = ?e, "rejecting spam failed"),
            }
            AccountOutcome { account_id, result }
        }
    }))
    .await
}

/// How a batch run went overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every account succeeded (or there were none).
    Success,
    /// Some accounts failed.
    Warning,
    /// Every account failed.
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes<T>(outcomes: &[AccountOutcome<T>]) -> Self {
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        Self {
            succeeded: outcomes.len() - failed,
            failed,
        }
    }

    pub fn status(&self) -> RunStatus {
        match (self.succeeded, self.failed) {
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::Error,
            _ => RunStatus::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccountError;
    use crate::oauth::RefreshedToken;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NoRefresh;

    #[async_trait]
    impl TokenRefresher for NoRefresh {
        async fn refresh(&self, _refresh_token: &str) -> eyre::Result<Option<RefreshedToken>> {
            Ok(None)
        }
    }

    fn account(account_id: &str, user_id: &str) -> CredentialRecord {
        CredentialRecord {
            account_id: account_id.into(),
            user_id: user_id.into(),
            access_token: format!("token-{account_id}"),
            refresh_token: "refresh".into(),
            expiry_ms: None,
        }
    }

    fn thread(id: &str, text: &str) -> serde_json::Value {
        json!({
            "snippet": {"topLevelComment": {"id": id, "snippet": {"textOriginal": text}}},
            "replies": {"comments": [{"id": format!("{id}.r"), "snippet": {"textOriginal": "buy cheap pills"}}]}
        })
    }

    fn options(server: &MockServer) -> ClientOptions {
        ClientOptions {
            api_base_url: server.uri(),
            ..ClientOptions::default()
        }
    }

    #[test]
    fn keyword_matching() {
        let keywords = vec!["pills".to_string(), String::new()];
        assert!(matches_keyword("cheap pills here", &keywords));
        assert!(!matches_keyword("cheap PILLS here", &keywords));
        assert!(!matches_keyword("nice video", &keywords));
        assert!(!matches_keyword("anything", &[String::new()]));
        assert!(!matches_keyword("anything", &[]));
    }

    #[tokio::test]
    async fn one_failing_account_does_not_affect_another() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .and(query_param("allThreadsRelatedToChannelId", "UC1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [thread("c1", "great video"), thread("c2", "pills pills pills")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .and(query_param("allThreadsRelatedToChannelId", "UC2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .and(query_param("allThreadsRelatedToChannelId", "UC3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [thread("c3", "pills")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(
            MemoryStore::new()
                .with_account(account("UC1", "alice"))
                .with_account(account("UC2", "bob"))
                .with_account(account("UC3", "carol"))
                .with_keywords("alice", ["pills"])
                .with_keywords("bob", ["pills"]),
        );
        let accounts = vec![
            account("UC1", "alice"),
            account("UC2", "bob"),
            account("UC3", "carol"),
        ];
        let outcomes = scan_accounts(
            store.clone(),
            store.as_ref(),
            Arc::new(NoRefresh),
            &options(&server),
            &accounts,
        )
        .await;

        assert_eq!(
            outcomes.iter().map(|o| o.account_id.as_str()).collect::<Vec<_>>(),
            ["UC1", "UC2", "UC3"]
        );
        let report = outcomes[0].result.as_ref().unwrap();
        assert_eq!(report.detection_count, 4);
        assert_eq!(report.spam_count, 3);
        assert_eq!(
            report.spam.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            ["c1.r", "c2", "c2.r"]
        );
        assert!(outcomes[1].result.is_err());
        // carol has no keywords: her channel is still scanned, nothing matches.
        let report = outcomes[2].result.as_ref().unwrap();
        assert_eq!(report.detection_count, 2);
        assert_eq!(report.spam_count, 0);
        assert!(report.spam.is_empty());

        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(
            summary,
            RunSummary {
                succeeded: 2,
                failed: 1
            }
        );
        assert_eq!(summary.status(), RunStatus::Warning);
    }

    #[tokio::test]
    async fn rejects_per_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/comments/setModerationStatus"))
            .and(query_param("moderationStatus", "rejected"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new().with_account(account("UC1", "alice")));
        let outcomes = reject_comments(
            store,
            Arc::new(NoRefresh),
            &options(&server),
            vec![
                ("UC1".into(), vec!["c1".into(), "c2".into()]),
                ("UC404".into(), vec!["c3".into()]),
            ],
        )
        .await;

        assert_eq!(*outcomes[0].result.as_ref().unwrap(), 2);
        assert_eq!(
            outcomes[1]
                .result
                .as_ref()
                .unwrap_err()
                .downcast_ref::<AccountError>(),
            Some(&AccountError::NotLinked {
                account_id: "UC404".into()
            })
        );
        assert_eq!(RunSummary::from_outcomes(&outcomes).status(), RunStatus::Warning);
    }

    #[test]
    fn run_status() {
        let status = |succeeded, failed| RunSummary { succeeded, failed }.status();
        assert_eq!(status(0, 0), RunStatus::Success);
        assert_eq!(status(3, 0), RunStatus::Success);
        assert_eq!(status(0, 2), RunStatus::Error);
        assert_eq!(status(1, 1), RunStatus::Warning);
    }
}
