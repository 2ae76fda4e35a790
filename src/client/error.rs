//! Error types for the exchange filters.
//!
//! Every filter in this crate shares one error type, [`ExchangeError`], so
//! filters can be stacked in any order without nesting error wrappers. The
//! terminal transport maps its own failures into the `Transport` and
//! `Timeout` variants; filters add the authentication-specific variants.

use std::time::Duration;

use http::StatusCode;

/// Type-erased error used for transport and body failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while exchanging a request for a response.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The underlying transport failed (connection refused, reset, ...).
    ///
    /// Transport errors never trigger a credential retry; only a received
    /// `401 Unauthorized` response does.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// A single underlying exchange did not complete in time.
    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be built (bad URI, bad method, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A header value contained characters that are not allowed.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    /// Failed to acquire or refresh an OAuth2 access token.
    ///
    /// This can happen when:
    /// - The token endpoint is unreachable
    /// - The refresh token is invalid or expired
    /// - The client credentials are incorrect
    /// - The token response is malformed
    #[error("token acquisition failed: {0}")]
    TokenAcquisitionFailed(String),

    /// Failed to perform HTTP Digest authentication.
    #[error("digest authentication failed: {0}")]
    DigestAuthFailed(String),

    /// Reading the response body failed.
    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),

    /// The response body was not valid JSON for the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A retrieval expected a success status and got something else.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl ExchangeError {
    /// Returns the HTTP status carried by a [`ExchangeError::Status`] error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ExchangeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors that can occur when constructing a [`WebClient`](super::WebClient)
/// from a [`ClientConfig`](crate::config::ClientConfig).
///
/// These are *setup-time* errors, not per-request errors like [`ExchangeError`].
#[derive(Debug, thiserror::Error)]
pub enum FromConfigError {
    /// The config doesn't specify a `base_url`.
    #[error("base_url is not set in the config")]
    MissingBaseUrl,

    /// The configured base URL can't be parsed.
    #[error("invalid base_url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The configured `auth_type` needs a field that isn't set.
    #[error("auth_type {auth_type} requires `{field}` to be set")]
    MissingCredential {
        auth_type: &'static str,
        field: &'static str,
    },

    /// The runtime backing a blocking client couldn't be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// A configured credential can't be sent as a header value.
    #[error("auth_type {auth_type}: `{field}` contains invalid header characters")]
    InvalidCredential {
        auth_type: &'static str,
        field: &'static str,
    },
}
