//! Persistence seams for linked accounts and their keyword lists.
//!
//! Credential records are created when an account is linked and afterwards only ever have their
//! access token and expiry rewritten by the refresh flow. [`TokenUpdate`] deliberately has no
//! refresh-token field, so no update can drop or overwrite the long-lived refresh token.

use crate::error::AccountError;
use async_trait::async_trait;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

/// The stored OAuth credentials of one linked channel.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The channel ID the account was linked under.
    pub account_id: String,
    /// The user that linked the account.
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires, in milliseconds since the Unix epoch. `None` means unknown.
    #[serde(default)]
    pub expiry_ms: Option<i64>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("account_id", &self.account_id)
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expiry_ms", &self.expiry_ms)
            .finish()
    }
}

/// The fields a token refresh is allowed to change.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    pub access_token: String,
    pub expiry_ms: Option<i64>,
}

impl fmt::Debug for TokenUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenUpdate")
            .field("access_token", &"<redacted>")
            .field("expiry_ms", &self.expiry_ms)
            .finish()
    }
}

/// Where linked-account credentials live.
///
/// A missing record is `Ok(None)`, not an error; callers turn it into
/// [`AccountError::NotLinked`] themselves.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, account_id: &str) -> eyre::Result<Option<CredentialRecord>>;

    /// Rewrites the access token and expiry of an existing record, leaving every other field as is.
    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> eyre::Result<()>;

    /// Stores a newly linked account, replacing any earlier record for the same account.
    async fn insert(&self, record: CredentialRecord) -> eyre::Result<()>;

    /// All linked accounts, ordered by account ID.
    async fn list(&self) -> eyre::Result<Vec<CredentialRecord>>;
}

/// Read access to each user's spam keywords.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    async fn keywords(&self, user_id: &str) -> eyre::Result<Vec<String>>;
}

/// The document both stores keep: accounts by ID and keywords by user ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    accounts: BTreeMap<String, CredentialRecord>,
    #[serde(default)]
    keywords: BTreeMap<String, Vec<String>>,
}

impl StoreState {
    fn update_tokens(&mut self, account_id: &str, update: TokenUpdate) -> eyre::Result<()> {
        let record = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| AccountError::NotLinked {
                account_id: account_id.to_string(),
            })?;
        record.access_token = update.access_token;
        record.expiry_ms = update.expiry_ms;
        Ok(())
    }

    fn insert(&mut self, record: CredentialRecord) {
        self.accounts.insert(record.account_id.clone(), record);
    }
}

/// An in-process store, handy for tests and for embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, record: CredentialRecord) -> Self {
        self.state.get_mut().insert(record);
        self
    }

    pub fn with_keywords<I, S>(mut self, user_id: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .get_mut()
            .keywords
            .insert(user_id.into(), keywords.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find(&self, account_id: &str) -> eyre::Result<Option<CredentialRecord>> {
        Ok(self.state.read().await.accounts.get(account_id).cloned())
    }

    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> eyre::Result<()> {
        self.state.write().await.update_tokens(account_id, update)
    }

    async fn insert(&self, record: CredentialRecord) -> eyre::Result<()> {
        self.state.write().await.insert(record);
        Ok(())
    }

    async fn list(&self) -> eyre::Result<Vec<CredentialRecord>> {
        Ok(self.state.read().await.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl KeywordStore for MemoryStore {
    async fn keywords(&self, user_id: &str) -> eyre::Result<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .keywords
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A store backed by a single JSON document on disk.
///
/// Every write goes to a sibling temporary file that is then renamed over the original, so a
/// crash mid-write leaves the previous document intact. The in-memory copy only changes once the
/// write has succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> eyre::Result<Self> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("parse credential store {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no credential store yet, starting empty");
                StoreState::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read credential store {}", path.display()));
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, state: &StoreState) -> eyre::Result<()> {
        let json = serde_json::to_vec_pretty(state).context("serialize credential store")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }

    async fn modify(&self, change: impl FnOnce(&mut StoreState) -> eyre::Result<()>) -> eyre::Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        change(&mut next)?;
        self.write(&next).await?;
        *state = next;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn find(&self, account_id: &str) -> eyre::Result<Option<CredentialRecord>> {
        Ok(self.state.lock().await.accounts.get(account_id).cloned())
    }

    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> eyre::Result<()> {
        self.modify(|state| state.update_tokens(account_id, update))
            .await
    }

    async fn insert(&self, record: CredentialRecord) -> eyre::Result<()> {
        self.modify(|state| {
            state.insert(record);
            Ok(())
        })
        .await
    }

    async fn list(&self) -> eyre::Result<Vec<CredentialRecord>> {
        Ok(self.state.lock().await.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl KeywordStore for JsonFileStore {
    async fn keywords(&self, user_id: &str) -> eyre::Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .await
            .keywords
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(account_id: &str) -> CredentialRecord {
        CredentialRecord {
            account_id: account_id.to_string(),
            user_id: "user-1".to_string(),
            access_token: "access-0".to_string(),
            refresh_token: "refresh-0".to_string(),
            expiry_ms: Some(1_000),
        }
    }

    #[tokio::test]
    async fn missing_account_is_none() {
        let store = MemoryStore::new().with_account(record("UC1"));
        assert!(store.find("UC2").await.unwrap().is_none());
        assert_eq!(store.find("UC1").await.unwrap(), Some(record("UC1")));
    }

    #[tokio::test]
    async fn update_only_touches_token_fields() {
        let store = MemoryStore::new().with_account(record("UC1"));
        store
            .update_tokens(
                "UC1",
                TokenUpdate {
                    access_token: "access-1".into(),
                    expiry_ms: None,
                },
            )
            .await
            .unwrap();
        let updated = store.find("UC1").await.unwrap().unwrap();
        assert_eq!(
            updated,
            CredentialRecord {
                access_token: "access-1".into(),
                expiry_ms: None,
                ..record("UC1")
            }
        );
    }

    #[tokio::test]
    async fn updating_unknown_account_is_not_linked() {
        let store = MemoryStore::new();
        let err = store
            .update_tokens(
                "UC9",
                TokenUpdate {
                    access_token: "x".into(),
                    expiry_ms: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<AccountError>(),
            Some(&AccountError::NotLinked {
                account_id: "UC9".into()
            })
        );
    }

    #[tokio::test]
    async fn keywords_default_to_empty() {
        let store = MemoryStore::new().with_keywords("user-1", ["buy now", "free"]);
        assert_eq!(store.keywords("user-1").await.unwrap(), ["buy now", "free"]);
        assert!(store.keywords("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        store.insert(record("UC2")).await.unwrap();
        store.insert(record("UC1")).await.unwrap();
        store
            .update_tokens(
                "UC1",
                TokenUpdate {
                    access_token: "access-1".into(),
                    expiry_ms: Some(5_000),
                },
            )
            .await
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let accounts = reopened.list().await.unwrap();
        assert_eq!(
            accounts.iter().map(|r| r.account_id.as_str()).collect::<Vec<_>>(),
            ["UC1", "UC2"]
        );
        assert_eq!(accounts[0].access_token, "access-1");
        assert_eq!(accounts[0].refresh_token, "refresh-0");
        assert_eq!(accounts[0].expiry_ms, Some(5_000));
        assert!(!dir.path().join("store.json.tmp").exists());
    }

    #[tokio::test]
    async fn json_store_reads_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{"keywords": {"user-1": ["casino"]}}"#).unwrap();
        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.keywords("user-1").await.unwrap(), ["casino"]);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_update_leaves_file_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store.insert(record("UC1")).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let update = TokenUpdate {
            access_token: "x".into(),
            expiry_ms: None,
        };
        assert!(store.update_tokens("UC404", update).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn debug_redacts_secrets() {
        let shown = format!("{:?}", record("UC1"));
        assert!(!shown.contains("access-0"));
        assert!(!shown.contains("refresh-0"));
        assert!(shown.contains("UC1"));
    }
}
