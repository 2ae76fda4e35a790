//! OAuth2 token acquisition through an exchange service.
//!
//! [`OAuthTokenSource`] is a [`TokenSource`] that POSTs a form-encoded grant
//! to a token endpoint. It uses a transport service handed to it at
//! construction, typically the same [`HttpTransport`](super::HttpTransport)
//! the API requests use, without any authentication filters in front of it:
//! you don't need authentication to *obtain* authentication.
//!
//! Two grants are supported:
//!
//! - **Refresh token**: `grant_type=refresh_token` with a client id. When the
//!   endpoint rotates the refresh token, the new one replaces the old one for
//!   every later refresh.
//! - **Client credentials**: `grant_type=client_credentials`, with the client
//!   id and secret sent as `Authorization: Basic`.

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Request, Response};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tokio::sync::Mutex;
use tower::Service;
use tracing::{debug, info, warn};

use super::authorization::basic_header_value;
use super::error::ExchangeError;
use super::token::{AccessToken, TokenFuture, TokenSource};

/// The response from an OAuth2 token endpoint.
///
/// ```json
/// {
///   "access_token": "eyJhbGciOiJ...",
///   "refresh_token": "dGhpcyBpcyBh...",
///   "expires_in": 3600
/// }
/// ```
#[derive(Debug, Clone)]
pub struct OAuthTokenResponse {
    pub access_token: String,

    /// A new refresh token, when the server rotates them.
    pub refresh_token: Option<String>,

    /// The lifetime of the access token in seconds.
    pub expires_in: Option<u64>,
}

/// Errors that can occur during OAuth2 token acquisition.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("HTTP request to token endpoint failed: {0}")]
    HttpError(String),

    #[error("Token endpoint returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token endpoint returned error (HTTP {status}): {body}")]
    TokenEndpointError { status: u16, body: String },
}

/// The OAuth2 grant used to obtain a new access token.
#[derive(Clone)]
pub enum Grant {
    RefreshToken {
        client_id: String,
        refresh_token: String,
        scope: Option<String>,
    },
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

impl Grant {
    /// The form body and optional `Authorization` value for a token request.
    fn build_token_request(&self) -> Result<(String, Option<http::HeaderValue>), ExchangeError> {
        match self {
            Grant::RefreshToken {
                client_id,
                refresh_token,
                scope,
            } => {
                let mut form = url::form_urlencoded::Serializer::new(String::new());
                form.append_pair("client_id", client_id)
                    .append_pair("refresh_token", refresh_token);
                if let Some(scope) = scope {
                    form.append_pair("scope", scope);
                }
                form.append_pair("grant_type", "refresh_token");
                Ok((form.finish(), None))
            }
            Grant::ClientCredentials {
                client_id,
                client_secret,
            } => {
                let form_body = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("grant_type", "client_credentials")
                    .finish();
                let authorization = basic_header_value(client_id, client_secret)?;
                Ok((form_body, Some(authorization)))
            }
        }
    }

    /// Replace the refresh token if the server issued a new one.
    fn rotate(&mut self, response: &OAuthTokenResponse) {
        if let (
            Grant::RefreshToken { refresh_token, .. },
            Some(new_refresh),
        ) = (self, &response.refresh_token)
        {
            debug!("token endpoint rotated the refresh token");
            *refresh_token = new_refresh.clone();
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::RefreshToken { client_id, .. } => f
                .debug_struct("RefreshToken")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Grant::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// A [`TokenSource`] that asks an OAuth2 token endpoint for new tokens.
pub struct OAuthTokenSource<S> {
    inner: Arc<OAuthInner<S>>,
}

struct OAuthInner<S> {
    transport: Mutex<S>,
    token_endpoint: String,
    grant: Mutex<Grant>,
}

impl<S> OAuthTokenSource<S> {
    pub fn new(transport: S, token_endpoint: impl Into<String>, grant: Grant) -> Self {
        OAuthTokenSource {
            inner: Arc::new(OAuthInner {
                transport: Mutex::new(transport),
                token_endpoint: token_endpoint.into(),
                grant: Mutex::new(grant),
            }),
        }
    }
}

impl<S> Clone for OAuthTokenSource<S> {
    fn clone(&self) -> Self {
        OAuthTokenSource {
            inner: self.inner.clone(),
        }
    }
}

impl<S, R> TokenSource for OAuthTokenSource<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<R>, Error = ExchangeError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    R: Body + Send + 'static,
    R::Data: Send,
    R::Error: fmt::Debug,
{
    fn fetch_token(&self) -> TokenFuture {
        let inner = self.inner.clone();

        Box::pin(async move {
            // Held until the response is rotated in, so an overlapping fetch
            // never spends a refresh token that is already used.
            let mut grant = inner.grant.lock().await;
            let (form_body, authorization) = grant.build_token_request()?;
            let mut transport = inner.transport.lock().await.clone();

            info!(endpoint = %inner.token_endpoint, "requesting OAuth token");

            std::future::poll_fn(|cx| transport.poll_ready(cx)).await?;

            let response =
                acquire_token(&mut transport, &inner.token_endpoint, form_body, authorization)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "token acquisition failed");
                        ExchangeError::TokenAcquisitionFailed(e.to_string())
                    })?;

            grant.rotate(&response);
            drop(grant);

            let token = AccessToken::from_response(&response);
            debug!(
                token_len = token.value.len(),
                expires_at = ?token.expires_at,
                "token acquired"
            );
            Ok(token)
        })
    }
}

/// POST a form-encoded grant to `endpoint` and parse the token response.
///
/// The caller is responsible for readying `transport` first.
pub(crate) async fn acquire_token<S, R>(
    transport: &mut S,
    endpoint: &str,
    form_body: String,
    authorization: Option<http::HeaderValue>,
) -> Result<OAuthTokenResponse, OAuthError>
where
    S: Service<Request<Full<Bytes>>, Response = Response<R>, Error = ExchangeError>,
    R: Body,
    R::Data: Buf,
    R::Error: fmt::Debug,
{
    debug!(endpoint = %endpoint, "POSTing to token endpoint");

    let mut builder = Request::post(endpoint)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(authorization) = authorization {
        builder = builder.header(AUTHORIZATION, authorization);
    }
    let request = builder
        .body(Full::new(Bytes::from(form_body)))
        .map_err(|e| OAuthError::HttpError(format!("failed to build token request: {e}")))?;

    let response = transport
        .call(request)
        .await
        .map_err(|e| OAuthError::HttpError(e.to_string()))?;

    let status = response.status();
    debug!(status = %status, "token endpoint responded");

    let collected = BodyExt::collect(response.into_body())
        .await
        .map_err(|e| OAuthError::HttpError(format!("failed to read token response body: {e:?}")))?;
    let bytes = collected.to_bytes();

    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).to_string();
        warn!(status = status.as_u16(), body = %body, "token endpoint returned error");
        return Err(OAuthError::TokenEndpointError {
            status: status.as_u16(),
            body,
        });
    }

    parse_token_response(&bytes)
}

fn parse_token_response(body: &[u8]) -> Result<OAuthTokenResponse, OAuthError> {
    let json: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| OAuthError::InvalidResponse(format!("invalid JSON: {e}")))?;

    let access_token = json["access_token"]
        .as_str()
        .ok_or_else(|| OAuthError::InvalidResponse("missing access_token field".into()))?
        .to_string();

    Ok(OAuthTokenResponse {
        access_token,
        refresh_token: json["refresh_token"].as_str().map(String::from),
        expires_in: json["expires_in"].as_u64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use http::{Method, StatusCode};

    use crate::client::mock::{MockExchange, json_response};

    fn refresh_grant() -> Grant {
        Grant::RefreshToken {
            client_id: "test-client-id".into(),
            refresh_token: "old-refresh".into(),
            scope: Some("openid offline_access".into()),
        }
    }

    #[test]
    fn parse_token_response_extracts_fields() {
        let body = br#"{"access_token":"my-token","refresh_token":"my-refresh","expires_in":3600}"#;
        let response = parse_token_response(body).unwrap();
        assert_eq!(response.access_token, "my-token");
        assert_eq!(response.refresh_token.as_deref(), Some("my-refresh"));
        assert_eq!(response.expires_in, Some(3600));
    }

    #[test]
    fn parse_token_response_rejects_missing_access_token() {
        let result = parse_token_response(br#"{"refresh_token":"oops"}"#);
        assert!(matches!(result, Err(OAuthError::InvalidResponse(_))));
    }

    #[test]
    fn grant_debug_hides_secrets() {
        let rendered = format!(
            "{:?}",
            Grant::ClientCredentials {
                client_id: "id".into(),
                client_secret: "hunter2".into(),
            }
        );
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn refresh_grant_posts_form_and_rotates_refresh_token() {
        let mock = MockExchange::respond_with(vec![
            json_response(
                StatusCode::OK,
                r#"{"access_token":"new_token","refresh_token":"new-refresh","expires_in":3600}"#,
            ),
            json_response(StatusCode::OK, r#"{"access_token":"newer_token"}"#),
        ]);
        let source = OAuthTokenSource::new(mock.clone(), "https://auth.example.com/token", refresh_grant());

        let token = source.fetch_token().await.unwrap();
        assert_eq!(token.value, "new_token");
        assert!(!token.is_expired());

        let token = source.fetch_token().await.unwrap();
        assert_eq!(token.value, "newer_token");
        assert!(token.expires_at.is_none());

        let captured = mock.take_captured_requests();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].method, Method::POST);
        assert_eq!(captured[0].uri, "https://auth.example.com/token");
        assert_eq!(
            captured[0].headers.get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );

        let first = String::from_utf8_lossy(&captured[0].body);
        assert!(first.contains("grant_type=refresh_token"), "got: {first}");
        assert!(first.contains("refresh_token=old-refresh"), "got: {first}");
        assert!(first.contains("client_id=test-client-id"), "got: {first}");

        // The rotated refresh token is used for the next refresh.
        let second = String::from_utf8_lossy(&captured[1].body);
        assert!(second.contains("refresh_token=new-refresh"), "got: {second}");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_spend_each_rotated_refresh_token_once() {
        let issued = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let endpoint = {
            let issued = issued.clone();
            let received = received.clone();
            tower::service_fn(move |req: Request<Full<Bytes>>| {
                let issued = issued.clone();
                let received = received.clone();
                async move {
                    let body = req.into_body().collect().await.unwrap().to_bytes();
                    received
                        .lock()
                        .unwrap()
                        .push(String::from_utf8_lossy(&body).into_owned());

                    tokio::time::sleep(Duration::from_millis(50)).await;

                    let n = issued.fetch_add(1, Ordering::SeqCst);
                    let json =
                        format!(r#"{{"access_token":"token-{n}","refresh_token":"r{n}"}}"#);
                    Ok::<_, ExchangeError>(Response::new(Full::new(Bytes::from(json))))
                }
            })
        };
        let source = OAuthTokenSource::new(endpoint, "https://auth.example.com/token", refresh_grant());

        let (first, second) = tokio::join!(source.fetch_token(), source.fetch_token());
        first.unwrap();
        second.unwrap();
        let third = source.fetch_token().await.unwrap();
        assert_eq!(third.value, "token-2");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 3);
        assert!(received[0].contains("refresh_token=old-refresh"), "got: {}", received[0]);
        assert!(received[1].contains("refresh_token=r0"), "got: {}", received[1]);
        assert!(received[2].contains("refresh_token=r1"), "got: {}", received[2]);
    }

    #[tokio::test]
    async fn client_credentials_use_basic_auth() {
        let mock = MockExchange::respond_with(vec![json_response(
            StatusCode::OK,
            r#"{"access_token":"service-token","expires_in":3600}"#,
        )]);
        let source = OAuthTokenSource::new(
            mock.clone(),
            "https://auth.example.com/token",
            Grant::ClientCredentials {
                client_id: "rob".into(),
                client_secret: "rob".into(),
            },
        );

        let token = source.fetch_token().await.unwrap();
        assert_eq!(token.value, "service-token");

        let captured = mock.take_captured_requests();
        assert_eq!(
            captured[0].headers.get(AUTHORIZATION).unwrap(),
            "Basic cm9iOnJvYg=="
        );
        assert_eq!(&captured[0].body[..], b"grant_type=client_credentials");
    }

    #[tokio::test]
    async fn endpoint_error_becomes_token_acquisition_failure() {
        let mock = MockExchange::respond_with(vec![json_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant"}"#,
        )]);
        let source = OAuthTokenSource::new(mock, "https://auth.example.com/token", refresh_grant());

        let err = source.fetch_token().await.unwrap_err();
        assert!(
            matches!(&err, ExchangeError::TokenAcquisitionFailed(msg) if msg.contains("400")),
            "expected TokenAcquisitionFailed with status 400, got: {err:?}"
        );
    }
}
