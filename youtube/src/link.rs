//! Turning a fresh OAuth grant into a stored, linked account.

use crate::error::AccountError;
use crate::oauth::{RefreshedToken, TokenRefresher};
use crate::store::{CredentialRecord, CredentialStore};
use crate::youtube_api::{AccessToken, ChannelsParams, ClientOptions, YouTubeClient};
use eyre::Context;
use std::sync::Arc;

/// Records the channel behind `grant` as linked by `user_id`.
///
/// The grant must carry a refresh token, or later sweeps could not run unattended; Google only
/// issues one when consent was forced. The channel is whichever one the grant is for. Linking a
/// channel again replaces its earlier record.
#[tracing::instrument(skip(store, refresher, options, grant))]
pub async fn link_account(
    store: &dyn CredentialStore,
    refresher: Arc<dyn TokenRefresher>,
    options: &ClientOptions,
    user_id: &str,
    grant: RefreshedToken,
) -> eyre::Result<CredentialRecord> {
    let Some(refresh_token) = grant.refresh_token.filter(|t| !t.is_empty()) else {
        return Err(AccountError::IncompleteGrant("refresh token").into());
    };

    let client = YouTubeClient::new(
        "",
        AccessToken::new(grant.access_token, refresh_token, grant.expiry_ms),
        refresher,
        options.api_client(),
    );
    let channels = client
        .list_channels(ChannelsParams::mine(&["id", "snippet"]))
        .await
        .context("look up the authorised channel")?;
    let Some(channel) = channels.items.into_iter().next() else {
        return Err(AccountError::IncompleteGrant("channel id").into());
    };

    // The lookup may have refreshed the token already.
    let record = client.token().await.into_record(channel.id, user_id);
    store
        .insert(record.clone())
        .await
        .context("store linked account")?;
    tracing::info!(
        account_id = %record.account_id,
        title = channel.snippet.as_ref().map(|s| s.title.as_str()).unwrap_or_default(),
        "linked YouTube channel"
    );
    Ok(record)
}
