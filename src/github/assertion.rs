//! App assertion (JWT) generation.
//!
//! GitHub authenticates an App by a JWT signed with RS256 using the App's
//! private key. The token is built by hand: base64url(header) "."
//! base64url(claims) "." base64url(signature), all without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rsa::signature::{SignatureEncoding, Signer};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::private_key::SigningKey;

/// Lifetime of an assertion. GitHub rejects anything above ten minutes;
/// three keeps replay exposure small.
pub const ASSERTION_LIFETIME_SECS: i64 = 180;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// JWT claims for GitHub App authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClaims {
    /// Issuer - the GitHub App ID
    pub iss: String,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AppClaims {
    pub fn new(app_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            iss: app_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        }
    }
}

/// Sign an App assertion for `app_id`, issued at `now`.
///
/// The result is deterministic for a given `now`, since RSA PKCS#1 v1.5
/// signatures carry no randomness.
pub fn sign_assertion(app_id: &str, key: &SigningKey, now: DateTime<Utc>) -> Result<String> {
    let header = Header {
        alg: "RS256".to_string(),
        typ: "JWT".to_string(),
    };
    let claims = AppClaims::new(app_id, now);

    let header_b64 = encode_segment(&header)?;
    let claims_b64 = encode_segment(&claims)?;
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let signature = key
        .signer()
        .try_sign(signing_input.as_bytes())
        .map_err(|e| Error::Signing(format!("pkcs1 v1.5 error: {}", e)))?;

    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// Decode the claims segment of an assertion without checking the signature.
pub fn decode_claims(assertion: &str) -> Result<AppClaims> {
    let segment = assertion
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Decode("assertion has no claims segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| Error::Decode(format!("invalid base64 in claims: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Decode(format!("invalid claims: {}", e)))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| Error::Signing(format!("marshal error: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
