//! OAuth 2.0 against Google for linking YouTube channels and refreshing their access tokens.

use async_trait::async_trait;
use eyre::Context;
use http_body_util::Full;
use hyper::body::{self, Bytes};
use hyper::service::service_fn;
use hyper::{Request, Response};
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl, reqwest,
};
use std::fmt;
use std::future::Future;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes needed to read comment threads and moderate them.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube.force-ssl",
    "https://www.googleapis.com/auth/youtube.readonly",
];

const LINKED_HTML: &str = "<!doctype html><html><body>\
    <p>Your YouTube channel is linked. You can close this window.</p>\
    </body></html>";

type GoogleClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth application credentials.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// The registered redirect URI for the hosted flow. The loopback flow picks its own.
    pub redirect_uri: Option<String>,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// The outcome of a token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Only present when Google rotated (or first issued) the refresh token.
    pub refresh_token: Option<String>,
    /// Absolute expiry in milliseconds since the Unix epoch, if Google said how long it lasts.
    pub expiry_ms: Option<i64>,
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expiry_ms", &self.expiry_ms)
            .finish_non_exhaustive()
    }
}

impl RefreshedToken {
    fn from_response(token: &BasicTokenResponse) -> Self {
        let now_ms = jiff::Timestamp::now().as_millisecond();
        Self {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expiry_ms: token.expires_in().map(|expires_in| {
                let expires_in = i64::try_from(expires_in.as_millis()).unwrap_or(i64::MAX);
                now_ms.saturating_add(expires_in)
            }),
        }
    }
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns `Ok(None)` when the refresh token itself was rejected, in which case the account
    /// has to be linked again.
    async fn refresh(&self, refresh_token: &str) -> eyre::Result<Option<RefreshedToken>>;
}

/// Runs Google's OAuth flows for one OAuth application.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthManager {
    pub fn new(config: OAuthConfig) -> eyre::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self { config, http })
    }

    fn client(&self) -> eyre::Result<GoogleClient> {
        Ok(
            BasicClient::new(ClientId::new(self.config.client_id.clone()))
                .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
                .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("authorization URL")?)
                .set_token_uri(TokenUrl::new(TOKEN_URL.to_string()).context("token URL")?),
        )
    }

    fn configured_redirect(&self) -> eyre::Result<RedirectUrl> {
        let Some(uri) = &self.config.redirect_uri else {
            eyre::bail!("no OAuth redirect URI configured");
        };
        RedirectUrl::new(uri.clone()).context("parse OAuth redirect URI")
    }

    /// The consent URL for the hosted flow, and the CSRF state the callback must echo back.
    ///
    /// Offline access with forced consent is requested so Google hands out a refresh token even
    /// for a channel that has been linked before.
    pub fn authorize_url(&self) -> eyre::Result<(String, CsrfToken)> {
        let client = self.client()?.set_redirect_uri(self.configured_redirect()?);
        let (url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok((url.to_string(), csrf))
    }

    /// Exchanges the `code` the hosted redirect received.
    #[tracing::instrument(skip_all)]
    pub async fn exchange_code(&self, code: String) -> eyre::Result<RefreshedToken> {
        let client = self.client()?.set_redirect_uri(self.configured_redirect()?);
        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&self.http)
            .await
            .context("exchange authorization code for tokens")?;
        Ok(RefreshedToken::from_response(&token))
    }

    /// Runs the whole flow from a terminal: opens the consent page in the user's browser and
    /// receives the redirect on a loopback port.
    pub async fn authenticate(&self) -> eyre::Result<RefreshedToken> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_code) = receive_redirect(csrf.clone())
            .await
            .context("set up loopback redirect")?;
        let client = self.client()?.set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _) = client
            // The flow runs exactly once, so the state is never reused.
            .authorize_url(move || csrf.clone())
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        webbrowser::open(auth_url.as_ref()).context("open user's browser")?;
        let code = eventually_code
            .await
            .context("await user authorization code")?;

        let token = client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .context("exchange authorization code for tokens")?;
        Ok(RefreshedToken::from_response(&token))
    }
}

#[async_trait]
impl TokenRefresher for OAuthManager {
    #[tracing::instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> eyre::Result<Option<RefreshedToken>> {
        let client = self.client()?;
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        match client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
        {
            Ok(token) => {
                tracing::debug!("refreshed OAuth token");
                Ok(Some(RefreshedToken::from_response(&token)))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(sr.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

/// Binds a one-shot HTTP server on a random loopback port.
///
/// Returns the redirect URL to hand to Google, and a future that resolves to the authorization
/// code once the browser comes back with a matching `state`.
async fn receive_redirect(
    csrf: CsrfToken,
) -> eyre::Result<(
    RedirectUrl,
    impl Future<Output = eyre::Result<AuthorizationCode>>,
)> {
    let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind to localhost")?;
    let addr = socket.local_addr().context("get local address")?;
    let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
        .context("construct redirect url")?;

    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let served = async move {
            let (conn, _) = socket.accept().await.context("accept")?;
            let conn = hyper_util::rt::TokioIo::new(conn);
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            let service = service_fn(move |req: Request<body::Incoming>| {
                let csrf = csrf.clone();
                let got = got.clone();
                async move {
                    let mut state = None;
                    let mut code = None;
                    for (k, v) in form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                    {
                        match &*k {
                            "state" => state = Some(v),
                            "code" => code = Some(v),
                            _ => {}
                        }
                    }
                    if state.as_deref() != Some(csrf.secret().as_str()) {
                        return Err("invalid csrf token");
                    }
                    let Some(code) = code else {
                        return Err("no authorization code found");
                    };
                    if got
                        .send(AuthorizationCode::new(code.into_owned()))
                        .await
                        .is_err()
                    {
                        return Err("authorization code already received");
                    }
                    Ok(Response::new(Full::<Bytes>::from(LINKED_HTML)))
                }
            });
            let mut serve = std::pin::pin!(
                hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
            );

            tokio::select! {
                exit = &mut serve => {
                    match exit {
                        Err(e) => Err(e).context("redirect server got bad request"),
                        Ok(()) => eyre::bail!("redirect server exited prematurely"),
                    }
                }
                code = gotten.recv() => {
                    // Let the browser get its page before the connection goes away.
                    serve.as_mut().graceful_shutdown();
                    if let Err(e) = serve.await {
                        tracing::debug!(error = %e, "redirect connection closed uncleanly");
                    }
                    code.ok_or_else(|| eyre::eyre!("redirect handler went away"))
                }
            }
        };
        let _ = tx.send(served.await);
    });

    Ok((url, async move {
        rx.await.context("redirect future dropped prematurely")?
    }))
}
