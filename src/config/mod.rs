use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::github::{self, Identity, SigningKey};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub github: GitHubAppSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// File the settings were read from, if one existed.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubAppSettings {
    /// GitHub App ID
    pub app_id: Option<String>,
    /// Installation the token is scoped to
    pub installation_id: Option<String>,
    /// Path to the App's PEM private key
    pub private_key_path: Option<PathBuf>,
    /// GitHub API endpoint (default: https://api.github.com)
    pub base_url: Option<String>,
    /// Refresh this many seconds before the token expires (default: 0)
    #[serde(default)]
    pub refresh_margin_secs: u64,
    /// Allow only one token refresh in flight at a time
    #[serde(default)]
    pub single_flight: bool,
}

/// Everything needed to build a [`github::Config`] once the key is loaded.
#[derive(Debug, Clone)]
pub struct ResolvedApp {
    pub identity: Identity,
    pub private_key_path: PathBuf,
    pub base_url: Option<String>,
}

impl GitHubAppSettings {
    /// Check that the identity and key path are set.
    pub fn resolve(&self) -> Result<ResolvedApp> {
        match (&self.app_id, &self.installation_id, &self.private_key_path) {
            (Some(app_id), Some(installation_id), Some(path))
                if !app_id.is_empty() && !installation_id.is_empty() =>
            {
                Ok(ResolvedApp {
                    identity: Identity::new(app_id.clone(), installation_id.clone()),
                    private_key_path: path.clone(),
                    base_url: self.base_url.clone(),
                })
            }
            _ => anyhow::bail!(
                "you need to set GITHUB_APP_ID, GITHUB_APP_INSTALLATION_ID and GITHUB_APP_PRIVATE_KEY_NAME"
            ),
        }
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }
}

impl ResolvedApp {
    /// Load the private key and build the App config.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<github::Config> {
        let key = github::load_private_key_with_cancel(&self.private_key_path, cancel)
            .await
            .map_err(|e| e.at_stage(github::Stage::KeyLoad))?;
        Ok(self.config(key))
    }

    pub fn config(&self, key: SigningKey) -> github::Config {
        let config = github::Config::new(key, self.identity.clone());
        match &self.base_url {
            Some(base_url) => config.with_base_url(base_url.as_str()),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("ghapp-token/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let mut settings: Settings =
                toml::from_str(&content).with_context(|| "Failed to parse configuration file")?;
            settings.source = Some(path.to_path_buf());
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// HTTP client handed to the token exchange.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .user_agent(&self.http.user_agent)
            .build()
            .context("Failed to create HTTP client")
    }
}
