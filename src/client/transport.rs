//! The terminal exchange: one request over the network, one response back.
//!
//! [`HttpTransport`] knows nothing about authentication or retries. It maps
//! connection failures to [`ExchangeError::Transport`], boxes the response
//! body, and enforces a per-exchange timeout. Every underlying exchange gets
//! its own timeout, so a slow retry fails the call instead of falling back to
//! the first response.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tower::Service;
use tracing::debug;

use super::error::ExchangeError;
use super::exchange::{ExchangeRequest, ExchangeResponse, boxed_body};

/// Plain HTTP/1 transport over the hyper-util connection-pooling client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: Client::builder(TokioExecutor::new()).build_http(),
            timeout: None,
        }
    }

    /// Use a pre-built hyper-util client (custom pool settings, ...).
    pub fn from_client(client: Client<HttpConnector, Full<Bytes>>) -> Self {
        HttpTransport {
            client,
            timeout: None,
        }
    }

    /// Fail any single exchange that takes longer than `timeout` to produce
    /// response headers.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<ExchangeRequest> for HttpTransport {
    type Response = ExchangeResponse;
    type Error = ExchangeError;
    type Future = Pin<Box<dyn Future<Output = Result<ExchangeResponse, ExchangeError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The pooled client queues internally.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ExchangeRequest) -> Self::Future {
        let client = self.client.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let method = req.method().clone();
            let uri = req.uri().clone();
            debug!(method = %method, uri = %uri, "sending request");

            let pending = client.request(req);
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .map_err(|_| ExchangeError::Timeout(limit))?,
                None => pending.await,
            };
            let response = result.map_err(|e| ExchangeError::Transport(Box::new(e)))?;

            debug!(method = %method, uri = %uri, status = %response.status(), "response received");
            Ok(response.map(boxed_body))
        })
    }
}
