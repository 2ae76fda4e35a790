//! Blocking facade over [`WebClient`].
//!
//! [`BlockingWebClient`] owns a current-thread tokio runtime and drives each
//! call to completion on it. Bodies are read in full before returning, so
//! the result no longer needs the runtime.
//!
//! Calling into a `BlockingWebClient` from inside an async context panics,
//! like any nested `block_on`.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;

use super::error::{ExchangeError, FromConfigError};
use super::response::ResponseEntity;
use super::web_client::{RequestSpec, WebClient};
use crate::config::ClientConfig;

#[derive(Debug)]
pub struct BlockingWebClient {
    client: WebClient,
    runtime: Runtime,
}

impl BlockingWebClient {
    pub fn new(client: WebClient) -> Result<Self, FromConfigError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(BlockingWebClient { client, runtime })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, FromConfigError> {
        Self::new(WebClient::from_config(config)?)
    }

    pub fn get(&self, target: &str) -> BlockingRequestSpec<'_> {
        self.request(Method::GET, target)
    }

    pub fn post(&self, target: &str) -> BlockingRequestSpec<'_> {
        self.request(Method::POST, target)
    }

    pub fn request(&self, method: Method, target: &str) -> BlockingRequestSpec<'_> {
        BlockingRequestSpec {
            spec: self.client.request(method, target),
            runtime: &self.runtime,
        }
    }
}

/// A request being built for a [`BlockingWebClient`].
pub struct BlockingRequestSpec<'a> {
    spec: RequestSpec,
    runtime: &'a Runtime,
}

impl BlockingRequestSpec<'_> {
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.spec = self.spec.header(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.spec = self.spec.body(body);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.spec = self.spec.json(value);
        self
    }

    /// Send the request and read the whole body, whatever the status.
    pub fn exchange(self) -> Result<ResponseEntity<Bytes>, ExchangeError> {
        let spec = self.spec;
        self.runtime.block_on(async move {
            let response = spec.exchange().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok(ResponseEntity {
                status,
                headers,
                body,
            })
        })
    }

    /// Send the request and deserialize a success response body as JSON.
    pub fn retrieve<T: DeserializeOwned>(self) -> Result<ResponseEntity<T>, ExchangeError> {
        self.runtime.block_on(self.spec.retrieve())
    }
}
