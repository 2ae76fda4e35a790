//! HTTP Digest authentication as a retry-on-401 strategy.
//!
//! The first request goes out without credentials. A `401` carrying a
//! `WWW-Authenticate: Digest ...` challenge is answered once:
//!
//! ```text
//! Client                              Server
//!   |--- GET /resource (no auth) ------->|
//!   |<-- 401 + WWW-Authenticate: --------|
//!   |    Digest realm, nonce, qop        |
//!   |--- GET /resource + Authorization: -|
//!   |    Digest username, response=<h>   |
//!   |<-- 200 OK -------------------------|
//! ```
//!
//! The hashing (MD5 or SHA-256, as negotiated by the server's `algorithm`
//! parameter) is done by the [`digest_auth`] crate. A 401 with another
//! scheme, or none, is returned to the caller unchanged.

use std::borrow::Cow;

use digest_auth::{AuthContext, HttpMethod, WwwAuthenticateHeader};
use http::HeaderValue;
use tracing::debug;

use super::error::ExchangeError;
use super::retry::{Challenge, CredentialUpgrade, RetryOnUnauthorizedLayer, UpgradeFuture};

/// Parse a Digest challenge out of a `WWW-Authenticate` header.
///
/// Returns `Ok(None)` if there's no header or it uses another scheme
/// (Basic, Bearer, ...). A header that claims to be Digest but can't be
/// parsed is an error.
pub fn parse_digest_challenge(
    www_authenticate: Option<&HeaderValue>,
) -> Result<Option<WwwAuthenticateHeader>, ExchangeError> {
    let Some(www_auth) = www_authenticate else {
        return Ok(None);
    };

    let www_auth = www_auth.to_str().map_err(|e| {
        ExchangeError::DigestAuthFailed(format!("non-ASCII WWW-Authenticate header: {e}"))
    })?;

    if !www_auth.starts_with("Digest ") {
        return Ok(None);
    }

    let challenge = digest_auth::parse(www_auth).map_err(|e| {
        ExchangeError::DigestAuthFailed(format!("failed to parse digest challenge: {e}"))
    })?;

    Ok(Some(challenge))
}

/// Compute an `Authorization: Digest ...` value answering `challenge`.
///
/// `challenge` is mutable because it tracks the nonce count (`nc`).
/// `uri` is the request's path and query, which the hash covers.
pub fn compute_authorization_header(
    challenge: &mut WwwAuthenticateHeader,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
) -> Result<HeaderValue, ExchangeError> {
    let context = AuthContext {
        username: Cow::Borrowed(username),
        password: Cow::Borrowed(password),
        uri: Cow::Borrowed(uri),
        // Only needed for qop=auth-int.
        body: None,
        method: HttpMethod(Cow::Owned(method.to_string())),
        // None lets digest_auth generate a random cnonce.
        cnonce: None,
    };

    let answer = challenge.respond(&context).map_err(|e| {
        ExchangeError::DigestAuthFailed(format!("failed to compute digest response: {e}"))
    })?;

    let mut value = HeaderValue::from_str(&answer.to_string()).map_err(|e| {
        ExchangeError::DigestAuthFailed(format!("digest header contains invalid characters: {e}"))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Answers a Digest challenge with the configured username and password.
#[derive(Clone)]
pub struct DigestUpgrade {
    username: String,
    password: String,
}

impl DigestUpgrade {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        DigestUpgrade {
            username: username.into(),
            password: password.into(),
        }
    }

    fn respond(&self, challenge: &Challenge) -> Result<Option<HeaderValue>, ExchangeError> {
        let Some(mut digest) = parse_digest_challenge(challenge.www_authenticate.as_ref())? else {
            debug!("401 without a digest challenge, passing through");
            return Ok(None);
        };

        let uri = challenge
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        compute_authorization_header(
            &mut digest,
            &self.username,
            &self.password,
            challenge.method.as_str(),
            uri,
        )
        .map(Some)
    }
}

impl CredentialUpgrade for DigestUpgrade {
    fn upgrade(&self, challenge: Challenge) -> UpgradeFuture {
        let result = self.respond(&challenge);
        Box::pin(async move { result })
    }
}

/// Send the request without credentials; answer a Digest challenge once.
pub fn digest_if_needed(
    username: impl Into<String>,
    password: impl Into<String>,
) -> RetryOnUnauthorizedLayer<DigestUpgrade> {
    RetryOnUnauthorizedLayer::new(DigestUpgrade::new(username, password))
}
