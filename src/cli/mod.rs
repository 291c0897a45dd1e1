//! Command-line interface for ghapp-token.
//!
//! Subcommands:
//! - `token` - Print an installation access token (default)
//! - `jwt` - Print a signed App assertion

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use ghapp_token::config::Settings;
use ghapp_token::github;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "ghapp-token")]
#[command(author, version, about = "Installation access tokens for GitHub Apps", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ghapp-token.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// GitHub App ID
    #[arg(long, env = "GITHUB_APP_ID")]
    pub app_id: Option<String>,

    /// Installation ID of the GitHub App
    #[arg(long, env = "GITHUB_APP_INSTALLATION_ID")]
    pub installation_id: Option<String>,

    /// Path to the App's private key (PEM)
    #[arg(long, env = "GITHUB_APP_PRIVATE_KEY_NAME")]
    pub private_key: Option<PathBuf>,

    /// GitHub API endpoint (for GitHub Enterprise Server)
    #[arg(long, env = "GITHUB_API_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print an installation access token
    Token {
        /// Print the token as JSON with its expiry
        #[arg(long)]
        json: bool,
    },

    /// Print a signed App assertion (JWT) for app-level API calls
    Jwt,
}

#[derive(Serialize)]
struct TokenOutput<'a> {
    token: &'a str,
    token_type: &'a str,
    expires_at: String,
}

impl Cli {
    /// Apply flags and environment variables on top of the settings file.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        let github = &mut settings.github;
        if let Some(app_id) = &self.app_id {
            github.app_id = Some(app_id.clone());
        }
        if let Some(installation_id) = &self.installation_id {
            github.installation_id = Some(installation_id.clone());
        }
        if let Some(path) = &self.private_key {
            github.private_key_path = Some(path.clone());
        }
        if let Some(base_url) = &self.base_url {
            github.base_url = Some(base_url.clone());
        }
    }
}

pub async fn run(cli: &Cli, settings: &Settings, cancel: &CancellationToken) -> Result<()> {
    let resolved = settings.github.resolve()?;

    let config = resolved.load(cancel).await?;

    match cli.command.as_ref().unwrap_or(&Commands::Token { json: false }) {
        Commands::Jwt => {
            let assertion =
                github::sign_assertion(&config.identity.app_id, &config.private_key, Utc::now())?;
            println!("{}", assertion);
        }
        Commands::Token { json } => {
            let source = config
                .token_source(Some(settings.http_client()?))
                .with_refresh_margin(settings.github.refresh_margin())
                .with_single_flight(settings.github.single_flight);

            let token = source
                .token_with_cancel(cancel)
                .await
                .context("could not get an installation access token")?;

            if *json {
                let output = TokenOutput {
                    token: &token.access_token,
                    token_type: &token.token_type,
                    expires_at: token.expiry.to_rfc3339(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", token.access_token);
            }
        }
    }

    Ok(())
}
