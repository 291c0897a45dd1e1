//! Installation access tokens for GitHub Apps.
//!
//! Load the App's private key, build a [`github::Config`] and ask a
//! [`github::TokenSource`] for tokens; it signs an App JWT, exchanges it for
//! an installation access token and caches the result until it expires.
//!
//! ```ignore
//! let key = ghapp_token::github::load_private_key("app.private-key.pem").await?;
//! let config = Config::new(key, Identity::new("12345", "67890"));
//! let source = config.token_source(None);
//! let token = source.token().await?;
//! ```

pub mod config;
pub mod github;

pub use github::{Config, Error, Identity, IssuedToken, TokenProvider, TokenSource};
