//! Errors callers are expected to branch on.
//!
//! Everything else travels as an [`eyre::Report`]; use [`eyre::Report::downcast_ref`] to recover
//! one of these (or a [`spamsweep_api::ApiError`]) from it.

/// Account-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// There is no stored credential for the account.
    #[error("YouTube account {account_id} is not linked")]
    NotLinked { account_id: String },

    /// Google refused the stored refresh token (revoked, expired, or otherwise invalid).
    #[error("refresh token for YouTube account {account_id} was rejected")]
    RefreshRejected { account_id: String },

    /// The upstream kept handing out cursors past the configured page cap.
    #[error("pagination exceeded {max_pages} pages")]
    PaginationExceeded { max_pages: usize },

    /// The authorization grant is missing something account linking needs.
    #[error("missing data: {0}")]
    IncompleteGrant(&'static str),
}
