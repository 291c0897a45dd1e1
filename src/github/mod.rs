//! GitHub App installation tokens.
//!
//! This module provides:
//! - Private key loading (PEM / PKCS#1)
//! - App assertion (JWT) generation
//! - Exchange of the assertion for an installation access token
//! - A caching token source that refreshes once the token has expired

pub mod assertion;
pub mod error;
pub mod exchange;
pub mod private_key;
pub mod token_source;

pub use assertion::{sign_assertion, AppClaims, ASSERTION_LIFETIME_SECS};
pub use error::{Error, Result, Stage};
pub use exchange::{default_http_client, exchange, IssuedToken, DEFAULT_BASE_URL, TOKEN_TYPE};
pub use private_key::{
    load_private_key, load_private_key_with_cancel, parse_private_key, SigningKey,
};
pub use token_source::{Clock, SystemClock, TokenProvider, TokenSource};

use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// The App and installation a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub app_id: String,
    pub installation_id: String,
}

impl Identity {
    pub fn new(app_id: impl Into<String>, installation_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            installation_id: installation_id.into(),
        }
    }
}

/// Configuration of a GitHub App installation.
#[derive(Debug, Clone)]
pub struct Config {
    pub private_key: SigningKey,
    pub identity: Identity,
    base_url: Option<String>,
}

impl Config {
    pub fn new(private_key: SigningKey, identity: Identity) -> Self {
        Self {
            private_key,
            identity,
            base_url: None,
        }
    }

    /// Override the GitHub API endpoint, e.g. for GitHub Enterprise Server.
    /// Any trailing slash is trimmed; an empty value restores the default.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Request a fresh installation access token, bypassing any cache.
    pub async fn token(&self, http: &reqwest::Client) -> Result<IssuedToken> {
        let assertion = sign_assertion(&self.identity.app_id, &self.private_key, Utc::now())
            .map_err(|e| e.at_stage(Stage::Sign))?;
        self.exchange_assertion(http, &assertion).await
    }

    pub(crate) async fn exchange_assertion(
        &self,
        http: &reqwest::Client,
        assertion: &str,
    ) -> Result<IssuedToken> {
        exchange(
            http,
            self.base_url(),
            &self.identity.installation_id,
            assertion,
        )
        .await
        .map_err(|e| {
            let stage = match e {
                Error::Decode(_) => Stage::Decode,
                _ => Stage::Exchange,
            };
            warn!(
                installation_id = %self.identity.installation_id,
                stage = %stage,
                error = %e,
                "Installation token exchange failed"
            );
            e.at_stage(stage)
        })
    }

    /// Token source that caches the issued token until it expires.
    ///
    /// `http` defaults to [`default_http_client`] when not given.
    pub fn token_source(&self, http: Option<reqwest::Client>) -> TokenSource {
        TokenSource::new(self.clone(), http.unwrap_or_else(default_http_client))
    }
}

/// Uncached provider: every call mints and exchanges a new assertion.
pub struct Uncached {
    config: Config,
    http: reqwest::Client,
}

impl Uncached {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl TokenProvider for Uncached {
    async fn token(&self) -> Result<IssuedToken> {
        self.config.token(&self.http).await
    }
}

/// Run `fut` until it completes or `cancel` fires, whichever happens first.
pub async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
