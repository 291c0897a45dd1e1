//! Caching token source for installation access tokens.
//!
//! The source is either Empty or holds a Valid token. `token()` returns the
//! cached token while it is current and otherwise signs a new assertion and
//! exchanges it. Nothing is stored unless the exchange succeeds, so a failed
//! refresh leaves the cache Empty.
//!
//! Concurrent callers that find the cache Empty each refresh on their own
//! unless single-flight mode is enabled, in which case one refresh runs and
//! the others wait for its result. The cache lock is never held across the
//! network call.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::assertion::sign_assertion;
use super::error::{Result, Stage};
use super::exchange::IssuedToken;
use super::{until_cancelled, Config};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Anything that can hand out an installation access token.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<IssuedToken>;
}

pub struct TokenSource {
    config: Config,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
    cached: RwLock<Option<IssuedToken>>,
    refresh_lock: Option<tokio::sync::Mutex<()>>,
}

impl TokenSource {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            clock: Arc::new(SystemClock),
            refresh_margin: Duration::zero(),
            cached: RwLock::new(None),
            refresh_lock: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Treat a token as expired `margin` before its actual expiry.
    /// Zero (the default) keeps a token until its expiry instant.
    pub fn with_refresh_margin(mut self, margin: std::time::Duration) -> Self {
        self.refresh_margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::zero());
        self
    }

    /// Let at most one refresh be in flight at a time.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.refresh_lock = enabled.then(|| tokio::sync::Mutex::new(()));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cached token, if it is still current.
    pub fn cached(&self) -> Option<IssuedToken> {
        let now = self.clock.now() + self.refresh_margin;
        self.cached
            .read()
            .as_ref()
            .filter(|token| token.is_valid_at(now))
            .cloned()
    }

    /// Drop the cached token so that the next call refreshes.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    pub async fn token(&self) -> Result<IssuedToken> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        match &self.refresh_lock {
            Some(lock) => {
                let _guard = lock.lock().await;
                // Another caller may have refreshed while we waited.
                if let Some(token) = self.cached() {
                    return Ok(token);
                }
                self.refresh().await
            }
            None => self.refresh().await,
        }
    }

    /// Same as [`TokenSource::token`], aborting with
    /// [`Error::Cancelled`](super::Error::Cancelled) once `cancel` fires.
    pub async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<IssuedToken> {
        until_cancelled(cancel, self.token())
            .await
            .map_err(|e| e.at_stage(Stage::Exchange))
    }

    /// Attach the current token to a request.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        let token = self.token().await?;
        Ok(request.header("authorization", token.authorization_value()))
    }

    async fn refresh(&self) -> Result<IssuedToken> {
        let identity = &self.config.identity;
        debug!(
            app_id = %identity.app_id,
            installation_id = %identity.installation_id,
            "Refreshing installation access token"
        );

        let assertion = sign_assertion(&identity.app_id, &self.config.private_key, self.clock.now())
            .map_err(|e| e.at_stage(Stage::Sign))?;
        let token = self.config.exchange_assertion(&self.http, &assertion).await?;

        *self.cached.write() = Some(token.clone());
        info!(
            installation_id = %identity.installation_id,
            expires_at = %token.expiry,
            "Cached installation access token"
        );

        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for TokenSource {
    async fn token(&self) -> Result<IssuedToken> {
        TokenSource::token(self).await
    }
}
