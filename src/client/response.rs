//! Consume-once access to a response.
//!
//! [`ClientResponse`] owns the response body. Every reader (`bytes`, `text`,
//! `json`, `into_entity`) takes `self`, so the body can be read at most once;
//! a second read does not compile.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ExchangeError;
use super::exchange::{ExchangeResponse, StatusClass};

/// A response returned by [`WebClient`](super::WebClient).
#[derive(Debug)]
pub struct ClientResponse {
    inner: ExchangeResponse,
}

/// A fully read response whose body has been deserialized into `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEntity<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: T,
}

impl ClientResponse {
    pub fn new(inner: ExchangeResponse) -> Self {
        ClientResponse { inner }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn status_class(&self) -> Option<StatusClass> {
        StatusClass::of(self.inner.status())
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Unwrap into the underlying `http::Response`.
    pub fn into_inner(self) -> ExchangeResponse {
        self.inner
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, ExchangeError> {
        let collected = self
            .inner
            .into_body()
            .collect()
            .await
            .map_err(ExchangeError::Body)?;
        Ok(collected.to_bytes())
    }

    /// Read the whole body as UTF-8, replacing invalid sequences.
    pub async fn text(self) -> Result<String, ExchangeError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole body and deserialize it as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ExchangeError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read the body as JSON, keeping the status and headers alongside it.
    pub async fn into_entity<T: DeserializeOwned>(self) -> Result<ResponseEntity<T>, ExchangeError> {
        let (parts, body) = self.inner.into_parts();
        let body = ClientResponse::new(http::Response::new(body)).json().await?;
        Ok(ResponseEntity {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Turn a 4xx/5xx response into [`ExchangeError::Status`].
    ///
    /// The error body is read so it can be reported; success and redirect
    /// responses are returned untouched.
    pub async fn error_for_status(self) -> Result<Self, ExchangeError> {
        let status = self.status();
        let is_error = self.status_class().is_none_or(StatusClass::is_error);
        if !is_error {
            return Ok(self);
        }

        let body = self.text().await?;
        debug!(status = %status, body_len = body.len(), "response has an error status");
        Err(ExchangeError::Status { status, body })
    }
}

impl From<ExchangeResponse> for ClientResponse {
    fn from(inner: ExchangeResponse) -> Self {
        ClientResponse::new(inner)
    }
}
