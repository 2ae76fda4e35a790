//! Unconditional `Authorization` header injection.
//!
//! [`AuthorizationLayer`] attaches a fixed credential to every request that
//! passes through it, replacing any `Authorization` value set further out in
//! the chain. It has no response-side logic and is idempotent: applying it
//! twice with the same credential yields the same request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request};
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::error::ExchangeError;

/// Build a `Basic <base64(username:password)>` header value (RFC 7617).
pub fn basic_header_value(username: &str, password: &str) -> Result<HeaderValue, ExchangeError> {
    let credentials = STANDARD.encode(format!("{username}:{password}"));
    sensitive(format!("Basic {credentials}"))
}

/// Build a `Bearer <token>` header value.
pub fn bearer_header_value(token: &str) -> Result<HeaderValue, ExchangeError> {
    sensitive(format!("Bearer {token}"))
}

fn sensitive(value: String) -> Result<HeaderValue, ExchangeError> {
    let mut value = HeaderValue::try_from(value).map_err(|e| {
        ExchangeError::InvalidHeader(format!("credential contains invalid header characters: {e}"))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Tower layer that sets `Authorization` on every outgoing request.
#[derive(Clone, Debug)]
pub struct AuthorizationLayer {
    value: HeaderValue,
}

impl AuthorizationLayer {
    /// Attach `Authorization: Bearer <token>`.
    pub fn bearer(token: &str) -> Result<Self, ExchangeError> {
        Ok(AuthorizationLayer {
            value: bearer_header_value(token)?,
        })
    }

    /// Attach `Authorization: Basic <base64(username:password)>`.
    pub fn basic(username: &str, password: &str) -> Result<Self, ExchangeError> {
        Ok(AuthorizationLayer {
            value: basic_header_value(username, password)?,
        })
    }

    /// Attach a pre-built header value as-is.
    pub fn from_value(value: HeaderValue) -> Self {
        AuthorizationLayer { value }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = Authorization<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Authorization {
            inner,
            value: self.value.clone(),
        }
    }
}

/// Service created by [`AuthorizationLayer`].
#[derive(Clone, Debug)]
pub struct Authorization<S> {
    inner: S,
    value: HeaderValue,
}

impl<S, B> Service<Request<B>> for Authorization<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // insert() replaces every existing value for the header.
        req.headers_mut().insert(AUTHORIZATION, self.value.clone());
        self.inner.call(req)
    }
}
