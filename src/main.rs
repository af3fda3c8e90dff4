//! CLI entry point for catalog-fetch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog_fetch_core::{
    AuthToken, CatalogClient, ConfigRepository, FetchConfig, FixedLocale, HttpResult,
    MemoryRepository, RequestOptions, SqliteRepository,
};
use clap::Parser;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command, TokenCommand};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let (repository, sqlite) = open_repository(&args).await?;

    let mut config = if args.insecure_dev {
        warn!("certificate validation disabled (--insecure-dev)");
        FetchConfig::development()
    } else {
        FetchConfig::default()
    };
    config = config.with_default_timeout(Duration::from_secs(args.timeout_secs));

    let locale = Arc::new(FixedLocale::new(args.locale.clone().unwrap_or_default()));
    let client = CatalogClient::new(repository, config, locale);

    let outcome = run(&client, args.command).await;

    // Lifecycle hook: the jar is only written back here.
    if let Err(error) = client.persist_cookies().await {
        warn!(error = %error, "cookies from this session were not saved");
    }
    if let Some(sqlite) = sqlite {
        sqlite.close().await;
    }

    outcome
}

async fn run(client: &CatalogClient, command: Command) -> Result<ExitCode> {
    match command {
        Command::Get { url, no_auth, body } => {
            let result = client
                .get_with_auth(&url, RequestOptions::get(), !no_auth, None)
                .await;
            report(result, body).await
        }
        Command::Post { url, json, body } => {
            let options = match json {
                Some(raw) => {
                    let payload: serde_json::Value =
                        serde_json::from_str(&raw).context("--json is not valid JSON")?;
                    RequestOptions::post().with_json_body(&payload)?
                }
                None => RequestOptions::post(),
            };
            let result = client.post(&url, options).await;
            report(result, body).await
        }
        Command::Token(TokenCommand::Set {
            authentication_url,
            access_token,
            refresh_token,
            refresh_url,
            token_type,
        }) => {
            let token = AuthToken {
                authentication_url: Some(authentication_url),
                access_token: Some(access_token),
                refresh_token,
                refresh_url,
                token_type,
                ..AuthToken::default()
            };
            client.tokens().save(&token).await?;
            info!(hostname = ?token.hostname(), "token stored");
            Ok(ExitCode::SUCCESS)
        }
        Command::Token(TokenCommand::Show { hostname }) => {
            if let Some(token) = client.tokens().get(&hostname).await {
                println!("{token:#?}");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("no token stored for {hostname}");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Wipe => {
            client.wipe_auth_data().await?;
            info!("authentication data wiped");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Prints the classified result as JSON, optionally with the body text.
async fn report(mut result: HttpResult, include_body: bool) -> Result<ExitCode> {
    let response = result.take_response();
    let exit = if result.is_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };

    let rendered = match (include_body, response) {
        (true, Some(response)) => {
            let text = response
                .text()
                .await
                .context("failed to read response body")?;
            serde_json::to_string_pretty(&result.with_data(text))?
        }
        _ => serde_json::to_string_pretty(&result)?,
    };
    println!("{rendered}");
    Ok(exit)
}

async fn open_repository(
    args: &Args,
) -> Result<(Arc<dyn ConfigRepository>, Option<Arc<SqliteRepository>>)> {
    if args.in_memory() {
        debug!("using in-memory store");
        return Ok((Arc::new(MemoryRepository::new()), None));
    }

    let path = match &args.db {
        Some(path) => path.clone(),
        None => default_db_path().context("cannot locate a config directory; pass --db")?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let sqlite = Arc::new(
        SqliteRepository::new(&path)
            .await
            .with_context(|| format!("cannot open store at {}", path.display()))?,
    );
    debug!(path = %path.display(), "opened store");
    Ok((Arc::clone(&sqlite) as Arc<dyn ConfigRepository>, Some(sqlite)))
}

/// `$XDG_CONFIG_HOME/catalog-fetch/store.db`, else `~/.config/catalog-fetch/store.db`.
fn default_db_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("catalog-fetch").join("store.db"))
}
