//! Exchange of an App assertion for an installation access token.
//!
//! See https://docs.github.com/en/rest/apps/apps#create-an-installation-access-token-for-an-app

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

use super::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("ghapp-token/", env!("CARGO_PKG_VERSION"));

/// Token type of every installation access token.
pub const TOKEN_TYPE: &str = "token";

/// Installation access token returned by GitHub.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expiry: DateTime<Utc>,
}

impl IssuedToken {
    /// A token is current only while its expiry is strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }

    /// Value for the `Authorization` header, e.g. `token ghs_...`.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Response from GitHub's installation access token endpoint.
/// Only the fields needed for the token are kept.
#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Client used when the caller does not inject one. GitHub rejects
/// requests without a user agent, so one is always set.
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// Build `{base}/app/installations/{installation_id}/access_tokens`.
///
/// The installation ID is percent-encoded as a single path segment. IDs
/// that a URL parser would treat as `.` or `..` are rejected, since they
/// cannot be carried as a segment at all.
pub fn token_endpoint(base_url: &str, installation_id: &str) -> Result<Url> {
    if matches!(installation_id, "" | "." | "..") {
        return Err(Error::Endpoint(format!(
            "installation id {:?} is not a valid path segment",
            installation_id
        )));
    }

    let mut url = Url::parse(base_url.trim_end_matches('/'))
        .map_err(|e| Error::Endpoint(format!("{}: {}", base_url, e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::Endpoint(format!("{}: cannot be a base url", base_url)))?
        .pop_if_empty()
        .extend(["app", "installations", installation_id, "access_tokens"]);

    Ok(url)
}

/// POST the assertion to the token endpoint and decode the issued token.
///
/// One request per call; retries and connection reuse belong to `http`.
pub async fn exchange(
    http: &reqwest::Client,
    base_url: &str,
    installation_id: &str,
    assertion: &str,
) -> Result<IssuedToken> {
    let url = token_endpoint(base_url, installation_id)?;
    debug!(installation_id = %installation_id, url = %url, "Requesting installation access token");

    let response = http
        .post(url)
        .header("authorization", format!("Bearer {}", assertion))
        .header("accept", ACCEPT)
        .send()
        .await
        .map_err(Error::Transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("body error: {}", e),
        };
        debug!(status = status.as_u16(), "Token endpoint rejected the request");
        return Err(Error::Remote {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Decode(format!("could not read body: {}", e)))?;
    let parsed: InstallationTokenResponse =
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))?;

    Ok(IssuedToken {
        access_token: parsed.token,
        token_type: TOKEN_TYPE.to_string(),
        expiry: parsed.expires_at,
    })
}
