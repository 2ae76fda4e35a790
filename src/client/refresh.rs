//! Bearer token refresh, triggered by a 401.
//!
//! Put [`refresh_if_needed`] *inside* the layer that attaches the current
//! token, so the first attempt carries the current token and the retry
//! carries the refreshed one:
//!
//! ```rust,ignore
//! let client = ServiceBuilder::new()
//!     .layer(AuthorizationLayer::bearer("token")?)
//!     .layer(refresh_if_needed(token_source))
//!     .service(transport);
//! ```

use tracing::debug;

use super::authorization::bearer_header_value;
use super::error::ExchangeError;
use super::retry::{Challenge, CredentialUpgrade, RetryOnUnauthorizedLayer, UpgradeFuture};
use super::token::TokenSource;

/// Fetches a new token from a [`TokenSource`] and answers with
/// `Authorization: Bearer <new token>`.
pub struct RefreshUpgrade<T> {
    source: T,
}

impl<T> RefreshUpgrade<T> {
    pub fn new(source: T) -> Self {
        RefreshUpgrade { source }
    }
}

impl<T: TokenSource> CredentialUpgrade for RefreshUpgrade<T> {
    fn upgrade(&self, _challenge: Challenge) -> UpgradeFuture {
        let pending = self.source.fetch_token();

        Box::pin(async move {
            let token = pending.await.map_err(|e| match e {
                ExchangeError::TokenAcquisitionFailed(_) => e,
                other => ExchangeError::TokenAcquisitionFailed(other.to_string()),
            })?;

            debug!(token_len = token.value.len(), "retrying with refreshed token");
            bearer_header_value(&token.value).map(Some)
        })
    }
}

/// Send the request as-is; if the response is 401, fetch a new token and
/// resend the original request once with `Authorization: Bearer <new token>`.
pub fn refresh_if_needed<T: TokenSource>(source: T) -> RetryOnUnauthorizedLayer<RefreshUpgrade<T>> {
    RetryOnUnauthorizedLayer::new(RefreshUpgrade::new(source))
}
