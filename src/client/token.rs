//! Access tokens and the sources that hand them out.
//!
//! A [`TokenSource`] is the "get me a new token" operation used by
//! [`refresh_if_needed`](super::refresh_if_needed). Implementations:
//!
//! - [`FnTokenSource`]: wraps any `Fn() -> Future<Output = Result<AccessToken, _>>`.
//! - [`OAuthTokenSource`](super::OAuthTokenSource): asks an OAuth2 token endpoint.
//! - [`SingleFlight`]: wraps another source so that concurrent refreshes
//!   coalesce into one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use super::error::ExchangeError;
use super::oauth::OAuthTokenResponse;

/// Buffer subtracted from token expiry to account for clock skew and network
/// latency.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(30);

/// An access token with optional expiry tracking.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The token string, suitable for `Authorization: Bearer`.
    pub value: String,

    /// `None` means the expiry is unknown and the token is treated as valid
    /// until the server rejects it.
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        AccessToken {
            value: value.into(),
            expires_at: None,
        }
    }

    /// A token that expires `expires_in` from now, minus a 30 second buffer.
    pub fn expiring_in(value: impl Into<String>, expires_in: Duration) -> Self {
        AccessToken {
            value: value.into(),
            expires_at: Some(Instant::now() + expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER)),
        }
    }

    pub fn from_response(response: &OAuthTokenResponse) -> Self {
        match response.expires_in {
            Some(secs) => Self::expiring_in(&response.access_token, Duration::from_secs(secs)),
            None => Self::new(&response.access_token),
        }
    }

    /// Returns `false` when the expiry is unknown.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

// Keep token values out of logs and panic messages.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &format_args!("<{} chars>", self.value.len()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Future returned by [`TokenSource::fetch_token`].
pub type TokenFuture = Pin<Box<dyn Future<Output = Result<AccessToken, ExchangeError>> + Send>>;

/// Something that can produce a fresh access token.
#[cfg_attr(test, mockall::automock)]
pub trait TokenSource: Send + Sync + 'static {
    fn fetch_token(&self) -> TokenFuture;
}

impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    fn fetch_token(&self) -> TokenFuture {
        (**self).fetch_token()
    }
}

impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    fn fetch_token(&self) -> TokenFuture {
        (**self).fetch_token()
    }
}

/// A [`TokenSource`] backed by a closure.
#[derive(Clone)]
pub struct FnTokenSource<F> {
    fetch: F,
}

/// Build a [`TokenSource`] from a closure returning a future.
pub fn token_source_fn<F, Fut>(fetch: F) -> FnTokenSource<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AccessToken, ExchangeError>> + Send + 'static,
{
    FnTokenSource { fetch }
}

impl<F, Fut> TokenSource for FnTokenSource<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AccessToken, ExchangeError>> + Send + 'static,
{
    fn fetch_token(&self) -> TokenFuture {
        Box::pin((self.fetch)())
    }
}

/// Coalesces concurrent refreshes into a single call to the wrapped source.
///
/// Refreshes run one at a time under an async mutex. A caller that had to
/// wait while another refresh completed reuses that result (if it hasn't
/// expired) instead of refreshing again. Clones share the same state.
pub struct SingleFlight<T> {
    inner: Arc<SingleFlightInner<T>>,
}

struct SingleFlightInner<T> {
    source: T,
    /// Bumped after every completed refresh, only while `latest` is locked.
    generation: AtomicU64,
    latest: Mutex<Option<AccessToken>>,
}

impl<T> SingleFlight<T> {
    pub fn new(source: T) -> Self {
        SingleFlight {
            inner: Arc::new(SingleFlightInner {
                source,
                generation: AtomicU64::new(0),
                latest: Mutex::new(None),
            }),
        }
    }
}

impl<T> Clone for SingleFlight<T> {
    fn clone(&self) -> Self {
        SingleFlight {
            inner: self.inner.clone(),
        }
    }
}

impl<T: TokenSource> TokenSource for SingleFlight<T> {
    fn fetch_token(&self) -> TokenFuture {
        let inner = self.inner.clone();

        Box::pin(async move {
            let observed = inner.generation.load(Ordering::Acquire);
            let mut latest = inner.latest.lock().await;

            if inner.generation.load(Ordering::Acquire) != observed
                && let Some(token) = latest.as_ref()
                && !token.is_expired()
            {
                debug!("reusing token from a concurrent refresh");
                return Ok(token.clone());
            }

            let token = inner.source.fetch_token().await?;
            *latest = Some(token.clone());
            inner.generation.fetch_add(1, Ordering::AcqRel);
            Ok(token)
        })
    }
}
