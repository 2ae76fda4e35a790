//! Retry-once-on-401 middleware.
//!
//! [`RetryOnUnauthorizedLayer`] forwards a request unchanged. If and only if
//! the response is `401 Unauthorized`, it asks a [`CredentialUpgrade`]
//! strategy for a new `Authorization` value, attaches it to a duplicate of
//! the *original* request and sends that through the *same* inner service.
//! The second response is returned whatever its status: there is never more
//! than one retry per call.
//!
//! ```text
//! Initial ──send──▶ FirstAttemptSent ──not 401──▶ return first response
//!                          │
//!                         401
//!                          ▼
//!                    Unauthorized ──upgrade──▶ CredentialUpgrade ──send──▶ return second response
//!                          │
//!                   strategy declines
//!                          ▼
//!                 return first response
//! ```
//!
//! Transport errors on either attempt are returned as the call's error; they
//! never trigger a retry. Dropping the call future before the retry is sent
//! means the retry never happens.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, Method, Request, Response, StatusCode, Uri};
use tower::{Layer, Service};
use tracing::{debug, info};

use super::error::ExchangeError;
use super::exchange::duplicate_request;

/// What a strategy gets to see of a rejected request.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub method: Method,
    pub uri: Uri,
    /// The `WWW-Authenticate` header of the 401 response, if any.
    pub www_authenticate: Option<HeaderValue>,
}

impl Challenge {
    fn new<B, R>(request: &Request<B>, response: &Response<R>) -> Self {
        Challenge {
            method: request.method().clone(),
            uri: request.uri().clone(),
            www_authenticate: response.headers().get(WWW_AUTHENTICATE).cloned(),
        }
    }
}

/// Future returned by [`CredentialUpgrade::upgrade`].
pub type UpgradeFuture =
    Pin<Box<dyn Future<Output = Result<Option<HeaderValue>, ExchangeError>> + Send>>;

/// A way of producing better credentials after a 401.
///
/// Returning `Ok(None)` declines the retry: the 401 is handed back to the
/// caller unchanged. Returning an error fails the call.
pub trait CredentialUpgrade: Send + Sync + 'static {
    fn upgrade(&self, challenge: Challenge) -> UpgradeFuture;
}

/// Tower layer that retries a request once with upgraded credentials when
/// the first response is `401 Unauthorized`.
pub struct RetryOnUnauthorizedLayer<U> {
    upgrade: Arc<U>,
}

impl<U> RetryOnUnauthorizedLayer<U> {
    pub fn new(upgrade: U) -> Self {
        RetryOnUnauthorizedLayer {
            upgrade: Arc::new(upgrade),
        }
    }
}

impl<U> Clone for RetryOnUnauthorizedLayer<U> {
    fn clone(&self) -> Self {
        RetryOnUnauthorizedLayer {
            upgrade: self.upgrade.clone(),
        }
    }
}

impl<U> fmt::Debug for RetryOnUnauthorizedLayer<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOnUnauthorizedLayer")
            .field("upgrade", &std::any::type_name::<U>())
            .finish()
    }
}

impl<S, U> Layer<S> for RetryOnUnauthorizedLayer<U> {
    type Service = RetryOnUnauthorized<S, U>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryOnUnauthorized {
            inner,
            upgrade: self.upgrade.clone(),
        }
    }
}

/// Service created by [`RetryOnUnauthorizedLayer`].
pub struct RetryOnUnauthorized<S, U> {
    inner: S,
    upgrade: Arc<U>,
}

impl<S: Clone, U> Clone for RetryOnUnauthorized<S, U> {
    fn clone(&self) -> Self {
        RetryOnUnauthorized {
            inner: self.inner.clone(),
            upgrade: self.upgrade.clone(),
        }
    }
}

impl<S, U, B, R> Service<Request<B>> for RetryOnUnauthorized<S, U>
where
    S: Service<Request<B>, Response = Response<R>, Error = ExchangeError> + Clone + Send + 'static,
    S::Future: Send,
    U: CredentialUpgrade,
    // Clone: the original request is replayed on retry.
    B: Clone + Send + 'static,
    R: Send + 'static,
{
    type Response = Response<R>;
    type Error = ExchangeError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<R>, ExchangeError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // Move the readied service into the future and leave a fresh clone
        // behind for the next call.
        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);
        let upgrade = self.upgrade.clone();

        Box::pin(exchange_with_retry(inner, upgrade, req))
    }
}

/// Per-call state. Nothing here outlives a single call.
enum RetryState<B, R> {
    Initial(Request<B>),
    FirstAttemptSent(Response<R>),
    Unauthorized(Response<R>),
    CredentialUpgrade(Request<B>),
}

async fn exchange_with_retry<S, U, B, R>(
    mut inner: S,
    upgrade: Arc<U>,
    req: Request<B>,
) -> Result<Response<R>, ExchangeError>
where
    S: Service<Request<B>, Response = Response<R>, Error = ExchangeError>,
    U: CredentialUpgrade,
    B: Clone,
{
    let original = duplicate_request(&req);
    let mut state = RetryState::Initial(req);

    loop {
        state = match state {
            RetryState::Initial(req) => {
                debug!(method = %original.method(), uri = %original.uri(), "sending first attempt");
                RetryState::FirstAttemptSent(inner.call(req).await?)
            }
            RetryState::FirstAttemptSent(response) => {
                if response.status() != StatusCode::UNAUTHORIZED {
                    debug!(status = %response.status(), "first attempt accepted");
                    return Ok(response);
                }
                RetryState::Unauthorized(response)
            }
            RetryState::Unauthorized(response) => {
                info!(uri = %original.uri(), "received 401, upgrading credentials");
                let challenge = Challenge::new(&original, &response);
                let Some(authorization) = upgrade.upgrade(challenge).await? else {
                    debug!("credential upgrade declined, returning the 401");
                    return Ok(response);
                };

                // Release the rejected response before the retry goes out.
                drop(response);

                let mut retry = duplicate_request(&original);
                retry.headers_mut().insert(AUTHORIZATION, authorization);
                RetryState::CredentialUpgrade(retry)
            }
            RetryState::CredentialUpgrade(retry) => {
                std::future::poll_fn(|cx| inner.poll_ready(cx)).await?;
                let response = inner.call(retry).await?;
                debug!(status = %response.status(), "retry response received");
                return Ok(response);
            }
        };
    }
}
