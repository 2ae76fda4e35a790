//! HTTP client filters for conditional authentication.
//!
//! A filter is a Tower [`Layer`](tower::Layer) around an exchange: a service
//! turning an [`ExchangeRequest`] into an [`ExchangeResponse`]. The filters
//! provided here are:
//!
//! - [`AuthorizationLayer`]: unconditionally attaches a Basic or Bearer
//!   `Authorization` header.
//! - [`basic_if_needed`]: sends the request without credentials and retries
//!   once with Basic credentials if the server answers `401`.
//! - [`refresh_if_needed`]: retries once with a freshly fetched Bearer token
//!   if the server answers `401`.
//! - [`digest_if_needed`]: answers a `401` Digest challenge once.
//!
//! All three conditional filters share [`RetryOnUnauthorizedLayer`], which
//! never retries more than once per call. [`WebClient`] composes filters
//! over an [`HttpTransport`] and offers a small request-building API.
//!
//! # Example
//!
//! ```rust,ignore
//! use webclient_auth::client::{AuthorizationLayer, WebClient, refresh_if_needed, token_source_fn};
//!
//! let client = WebClient::builder()
//!     .base_url("http://localhost:8080")
//!     .filter(AuthorizationLayer::bearer("token")?)
//!     .filter(refresh_if_needed(token_source_fn(|| async {
//!         Ok(AccessToken::new("new_token"))
//!     })))
//!     .build()?;
//!
//! let message = client.get("/messages/1").retrieve::<Message>().await?;
//! ```

pub mod authorization;
pub mod basic;
pub mod blocking;
pub mod digest;
pub mod error;
pub mod exchange;
pub mod oauth;
pub mod refresh;
pub mod response;
pub mod retry;
pub mod token;
pub mod transport;
pub mod web_client;

#[cfg(test)]
mod mock;

pub use authorization::{Authorization, AuthorizationLayer};
pub use basic::{BasicUpgrade, basic_if_needed};
pub use blocking::{BlockingRequestSpec, BlockingWebClient};
pub use digest::{DigestUpgrade, digest_if_needed};
pub use error::{BoxError, ExchangeError, FromConfigError};
pub use exchange::{BoxExchange, ExchangeRequest, ExchangeResponse, ResponseBody, StatusClass};
pub use oauth::{Grant, OAuthError, OAuthTokenResponse, OAuthTokenSource};
pub use refresh::{RefreshUpgrade, refresh_if_needed};
pub use response::{ClientResponse, ResponseEntity};
pub use retry::{Challenge, CredentialUpgrade, RetryOnUnauthorized, RetryOnUnauthorizedLayer};
pub use token::{AccessToken, FnTokenSource, SingleFlight, TokenSource, token_source_fn};
pub use transport::HttpTransport;
pub use web_client::{RequestSpec, WebClient, WebClientBuilder};
