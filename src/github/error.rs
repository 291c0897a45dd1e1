//! Errors raised while issuing installation access tokens.
//!
//! Each stage of the pipeline has its own variant. When a stage fails on
//! the way to a token, the underlying error is wrapped in [`Error::Refresh`]
//! together with the [`Stage`] that produced it.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    KeyLoad,
    Sign,
    Exchange,
    Decode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::KeyLoad => "key load",
            Stage::Sign => "sign",
            Stage::Exchange => "exchange",
            Stage::Decode => "decode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not read private key file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid private key: {0}")]
    Format(String),

    #[error("could not generate a jwt: {0}")]
    Signing(String),

    #[error("invalid token endpoint: {0}")]
    Endpoint(String),

    #[error("http error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("http status {status}, body {body}")]
    Remote { status: u16, body: String },

    #[error("invalid json response: {0}")]
    Decode(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{stage} failed: {source}")]
    Refresh {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the stage it came from.
    ///
    /// An error that is already a refresh failure is returned unchanged.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            Error::Refresh { .. } => self,
            other => Error::Refresh {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage annotation, if this is a refresh failure.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Refresh { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, with any refresh annotation peeled off.
    pub fn cause(&self) -> &Error {
        match self {
            Error::Refresh { source, .. } => source.cause(),
            other => other,
        }
    }

    /// HTTP status returned by the token endpoint, if the exchange was rejected.
    pub fn status(&self) -> Option<u16> {
        match self.cause() {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause(), Error::Cancelled)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
