use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context;
use spamsweep_api::{Body, RequestOptions, ResponseData};
use spamsweep_youtube::config::Config;
use spamsweep_youtube::oauth::OAuthManager;
use spamsweep_youtube::store::{CredentialStore, JsonFileStore};
use spamsweep_youtube::sweep::{self, RunStatus, RunSummary};
use spamsweep_youtube::{AccountError, ClientOptions, YouTubeClient, link_account};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Find and remove keyword spam in the comments of your YouTube channels.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Link a YouTube channel by signing in with Google in the browser.
    Link {
        /// Who the channel is linked for; their keywords are used when scanning it.
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// Scan linked channels for comments containing their owner's keywords.
    Scan {
        /// Only scan these accounts. Scans every linked account by default.
        #[arg(long = "account")]
        accounts: Vec<String>,
        /// Print the reports as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Reject (hide) comments on one or more linked channels.
    Reject {
        /// Comments to reject, as `ACCOUNT=COMMENT[,COMMENT...]`. Repeat for more channels.
        #[arg(required = true, value_parser = parse_reject_batch)]
        batches: Vec<(String, Vec<String>)>,
    },
    /// List the public videos of a linked channel.
    Videos {
        #[arg(long)]
        account: String,
    },
    /// Print every comment on a linked channel as JSON.
    Comments {
        #[arg(long)]
        account: String,
        /// Keep replies inside their thread instead of listing them alongside it.
        #[arg(long)]
        nested: bool,
    },
    /// Make a call to the internal API, authenticated with the cron secret.
    Internal {
        method: HttpMethod,
        endpoint: String,
        /// Request body. Sent as JSON if it parses as JSON, as text otherwise.
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Before anything reads the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let Cli { config, command } = Cli::parse();

    match command {
        Command::Link { user } => {
            let Services {
                store,
                refresher,
                options,
            } = Services::new(&config).await?;
            let grant = refresher
                .authenticate()
                .await
                .context("authorize YouTube account")?;
            let record = link_account(store.as_ref(), refresher, &options, &user, grant).await?;
            eprintln!("linked {} for {}", record.account_id, record.user_id);
        }
        Command::Scan { accounts, json } => {
            let services = Services::new(&config).await?;
            scan(services, accounts, json).await?;
        }
        Command::Reject { batches } => {
            let services = Services::new(&config).await?;
            reject(services, batches).await?;
        }
        Command::Videos { account } => {
            let client = Services::new(&config).await?.connect(&account).await?;
            for video in client.my_videos().await? {
                println!("{}  {}  {}", video.id, video.published_at, video.title);
            }
        }
        Command::Comments { account, nested } => {
            let client = Services::new(&config).await?.connect(&account).await?;
            let comments = client.comment_threads_for_channel(&account, !nested).await?;
            println!("{}", serde_json::to_string_pretty(&comments)?);
        }
        Command::Internal {
            method,
            endpoint,
            body,
        } => internal(&config, method, endpoint, body).await?,
    }
    Ok(())
}

/// What every YouTube-facing subcommand needs.
struct Services {
    store: Arc<JsonFileStore>,
    refresher: Arc<OAuthManager>,
    options: ClientOptions,
}

impl Services {
    async fn new(config: &Config) -> eyre::Result<Self> {
        let store = JsonFileStore::open(&config.store)
            .await
            .context("open credential store")?;
        Ok(Self {
            store: Arc::new(store),
            refresher: Arc::new(OAuthManager::new(config.oauth()?)?),
            options: config.client_options(),
        })
    }

    async fn connect(self, account_id: &str) -> eyre::Result<YouTubeClient> {
        YouTubeClient::connect(self.store, self.refresher, account_id, &self.options).await
    }
}

async fn scan(services: Services, accounts: Vec<String>, json: bool) -> eyre::Result<()> {
    let Services {
        store,
        refresher,
        options,
    } = services;
    let accounts = if accounts.is_empty() {
        store.list().await.context("list linked accounts")?
    } else {
        let mut records = Vec::with_capacity(accounts.len());
        for account_id in accounts {
            let record = store
                .find(&account_id)
                .await?
                .ok_or(AccountError::NotLinked { account_id })?;
            records.push(record);
        }
        records
    };
    if accounts.is_empty() {
        eprintln!("no linked accounts; run `spamsweep link` first");
        return Ok(());
    }

    let outcomes =
        sweep::scan_accounts(store.clone(), store.as_ref(), refresher, &options, &accounts).await;
    let summary = RunSummary::from_outcomes(&outcomes);

    if json {
        let reports: Vec<_> = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .collect();
        let errors: Vec<_> = outcomes
            .iter()
            .filter_map(|o| {
                let e = o.result.as_ref().err()?;
                Some(serde_json::json!({
                    "accountId": o.account_id,
                    "error": format!("{e:#}"),
                }))
            })
            .collect();
        let out = serde_json::json!({
            "status": summary.status(),
            "summary": summary,
            "reports": reports,
            "errors": errors,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for outcome in &outcomes {
            match &outcome.result {
                Ok(report) => {
                    println!(
                        "{}: {} spam in {} comments",
                        report.account_id, report.spam_count, report.detection_count
                    );
                    for comment in &report.spam {
                        println!(
                            "  {} [{}] {}",
                            comment.id, comment.author_display_name, comment.text_original
                        );
                    }
                }
                Err(e) => println!("{}: failed: {e:#}", outcome.account_id),
            }
        }
    }

    if summary.status() == RunStatus::Error {
        eyre::bail!("every scan failed");
    }
    Ok(())
}

/// Parses `ACCOUNT=COMMENT[,COMMENT...]`.
fn parse_reject_batch(arg: &str) -> Result<(String, Vec<String>), String> {
    let Some((account, comments)) = arg.split_once('=') else {
        return Err("expected ACCOUNT=COMMENT[,COMMENT...]".to_string());
    };
    let comments: Vec<String> = comments
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();
    if account.is_empty() || comments.is_empty() {
        return Err("expected ACCOUNT=COMMENT[,COMMENT...]".to_string());
    }
    Ok((account.to_string(), comments))
}

/// Folds batches naming the same account into one, keeping first-seen order.
fn merge_batches(batches: Vec<(String, Vec<String>)>) -> Vec<(String, Vec<String>)> {
    let mut merged: Vec<(String, Vec<String>)> = Vec::with_capacity(batches.len());
    for (account, comments) in batches {
        match merged.iter_mut().find(|(a, _)| *a == account) {
            Some((_, existing)) => existing.extend(comments),
            None => merged.push((account, comments)),
        }
    }
    merged
}

async fn reject(services: Services, batches: Vec<(String, Vec<String>)>) -> eyre::Result<()> {
    let Services {
        store,
        refresher,
        options,
    } = services;
    let outcomes =
        sweep::reject_comments(store, refresher, &options, merge_batches(batches)).await;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(rejected) => eprintln!("rejected {rejected} comments on {}", outcome.account_id),
            Err(e) => eprintln!("{}: failed: {e:#}", outcome.account_id),
        }
    }
    if RunSummary::from_outcomes(&outcomes).status() == RunStatus::Error {
        eyre::bail!("every rejection failed");
    }
    Ok(())
}

async fn internal(
    config: &Config,
    method: HttpMethod,
    endpoint: String,
    body: Option<String>,
) -> eyre::Result<()> {
    let api = config.internal_api()?;
    let body = body.map(|body| match serde_json::from_str(&body) {
        Ok(value) => Body::Json(value),
        Err(_) => Body::Text(body),
    });
    let response = api
        .request(method.into(), endpoint.as_str(), body, RequestOptions::default())
        .await
        .with_context(|| format!("call internal API: {endpoint}"))?;
    eprintln!("HTTP {}", response.status);
    match response.data {
        ResponseData::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        ResponseData::Text(text) => println!("{text}"),
        ResponseData::NoContent => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reject_takes_one_batch_per_channel() {
        let cli = Cli::try_parse_from(["spamsweep", "reject", "UC1=c1,c2", "UC2=c3", "UC1=c4"])
            .unwrap();
        let Command::Reject { batches } = cli.command else {
            panic!("expected reject");
        };
        assert_eq!(
            merge_batches(batches),
            vec![
                ("UC1".to_string(), vec!["c1".into(), "c2".into(), "c4".into()]),
                ("UC2".to_string(), vec!["c3".into()]),
            ]
        );
    }

    #[test]
    fn malformed_reject_batches_are_refused() {
        assert!(parse_reject_batch("UC1").is_err());
        assert!(parse_reject_batch("=c1").is_err());
        assert!(parse_reject_batch("UC1=").is_err());
        assert!(parse_reject_batch("UC1= , ").is_err());
        assert_eq!(
            parse_reject_batch("UC1=c1, c2").unwrap(),
            ("UC1".to_string(), vec!["c1".to_string(), "c2".to_string()])
        );
        assert!(Cli::try_parse_from(["spamsweep", "reject"]).is_err());
    }
}
