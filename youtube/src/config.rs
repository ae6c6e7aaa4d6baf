//! Process configuration, read from flags or the environment.

use crate::oauth::OAuthConfig;
use crate::youtube_api::{ClientOptions, DEFAULT_API_BASE};
use spamsweep_api::{ApiClient, ApiConfig, AuthConfig, StaticToken};
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every subcommand.
///
/// Each value can be given as a flag or through the environment (a `.env` file works too).
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// OAuth client ID of the Google Cloud project.
    #[arg(long, env = "GOOGLE_CLIENT_ID", global = true)]
    pub google_client_id: Option<String>,

    /// OAuth client secret of the Google Cloud project.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub google_client_secret: Option<String>,

    /// Registered redirect URI for the hosted OAuth flow.
    ///
    /// `link` uses a loopback redirect of its own and ignores this.
    #[arg(long, env = "GOOGLE_REDIRECT_URI", global = true)]
    pub google_redirect_uri: Option<String>,

    #[arg(long, env = "YOUTUBE_API_BASE_URL", default_value = DEFAULT_API_BASE, global = true)]
    pub youtube_api_base_url: String,

    /// JSON file holding linked accounts and keywords.
    #[arg(long, env = "SPAMSWEEP_STORE", default_value = "spamsweep.json", global = true)]
    pub store: PathBuf,

    /// Base URL of the internal API.
    #[arg(long, env = "API_URL", global = true)]
    pub api_url: Option<String>,

    /// Shared secret for privileged internal API calls.
    #[arg(long, env = "CRON_SECRET", hide_env_values = true, global = true)]
    pub cron_secret: Option<String>,

    /// Upper bound on each outbound call, in milliseconds.
    #[arg(long, env = "SPAMSWEEP_TIMEOUT_MS", default_value_t = 10_000, global = true)]
    pub timeout_ms: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn oauth(&self) -> eyre::Result<OAuthConfig> {
        let Some(client_id) = self.google_client_id.clone() else {
            eyre::bail!("GOOGLE_CLIENT_ID is not set");
        };
        let Some(client_secret) = self.google_client_secret.clone() else {
            eyre::bail!("GOOGLE_CLIENT_SECRET is not set");
        };
        Ok(OAuthConfig {
            client_id,
            client_secret,
            redirect_uri: self.google_redirect_uri.clone(),
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            api_base_url: self.youtube_api_base_url.clone(),
            timeout: self.timeout(),
            ..ClientOptions::default()
        }
    }

    /// A client for the internal API that authenticates with the cron secret, if there is one.
    pub fn internal_api(&self) -> eyre::Result<ApiClient> {
        let Some(api_url) = &self.api_url else {
            eyre::bail!("API_URL is not set");
        };
        let auth = match &self.cron_secret {
            Some(secret) => AuthConfig::with_provider(StaticToken(secret.clone())),
            None => {
                tracing::warn!("CRON_SECRET is not set, internal calls go out unauthenticated");
                AuthConfig::default()
            }
        };
        Ok(ApiClient::with_auth(
            ApiConfig::new(api_url).with_timeout(self.timeout()),
            auth,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Config {
        Cli::try_parse_from(std::iter::once("spamsweep").chain(args.iter().copied()))
            .unwrap()
            .config
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--google-client-id",
            "id",
            "--google-client-secret",
            "secret",
            "--youtube-api-base-url",
            "http://127.0.0.1:9000",
            "--timeout-ms",
            "2500",
        ]);
        let oauth = config.oauth().unwrap();
        assert_eq!(oauth.client_id, "id");
        assert_eq!(oauth.client_secret, "secret");

        let options = config.client_options();
        assert_eq!(options.api_base_url, "http://127.0.0.1:9000");
        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert_eq!(options.moderation_batch_size, 100);
    }

    #[test]
    fn missing_oauth_credentials_are_reported() {
        let config = Config {
            google_client_id: None,
            google_client_secret: None,
            google_redirect_uri: None,
            youtube_api_base_url: DEFAULT_API_BASE.into(),
            store: "spamsweep.json".into(),
            api_url: None,
            cron_secret: None,
            timeout_ms: 10_000,
        };
        let err = config.oauth().unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLIENT_ID"));
        assert!(config.internal_api().is_err());

        let config = Config {
            api_url: Some("http://localhost:3000".into()),
            ..config
        };
        assert_eq!(
            config.internal_api().unwrap().config().base_url,
            "http://localhost:3000"
        );
    }
}
