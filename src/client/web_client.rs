//! A small request-building client over a composed filter chain.
//!
//! [`WebClient`] owns a type-erased exchange: the terminal transport wrapped by
//! every filter registered on the builder. The first filter added is the
//! outermost, so it sees the request first and the response last.
//!
//! ```rust,ignore
//! let client = WebClient::builder()
//!     .base_url("http://localhost:8080")
//!     .filter(basic_if_needed("rob", "rob"))
//!     .build()?;
//!
//! let entity = client.get("/messages/1").retrieve::<Message>().await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Uri};
use http_body::Body;
use http_body_util::Full;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt as _};
use tracing::debug;
use url::Url;

use super::authorization::AuthorizationLayer;
use super::basic::basic_if_needed;
use super::digest::digest_if_needed;
use super::error::{BoxError, ExchangeError, FromConfigError};
use super::exchange::{BoxExchange, ExchangeRequest, ExchangeResponse, boxed_body};
use super::oauth::{Grant, OAuthTokenSource};
use super::refresh::refresh_if_needed;
use super::response::{ClientResponse, ResponseEntity};
use super::token::SingleFlight;
use super::transport::HttpTransport;
use crate::config::{AuthType, ClientConfig};

type Filter = Arc<dyn Fn(BoxExchange) -> BoxExchange + Send + Sync>;

/// Builder for [`WebClient`].
#[derive(Default)]
pub struct WebClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    filters: Vec<Filter>,
}

impl WebClientBuilder {
    /// Resolve relative request paths against `base_url`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Per-exchange timeout of the default [`HttpTransport`]. A retry gets
    /// its own timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append a filter. Filters added earlier wrap filters added later.
    pub fn filter<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxExchange> + Send + Sync + 'static,
        L::Service: Service<ExchangeRequest, Response = ExchangeResponse, Error = ExchangeError>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<ExchangeRequest>>::Future: Send + 'static,
    {
        self.filters
            .push(Arc::new(move |inner| BoxCloneService::new(layer.layer(inner))));
        self
    }

    /// Build over the default [`HttpTransport`].
    pub fn build(self) -> Result<WebClient, FromConfigError> {
        let mut transport = HttpTransport::new();
        if let Some(timeout) = self.timeout {
            transport = transport.with_timeout(timeout);
        }
        self.build_with(transport)
    }

    /// Build over any terminal exchange service.
    pub fn build_with<S, B>(self, transport: S) -> Result<WebClient, FromConfigError>
    where
        S: Service<ExchangeRequest, Response = Response<B>, Error = ExchangeError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let base_url = self.base_url.as_deref().map(Url::parse).transpose()?;

        let mut exchange: BoxExchange =
            BoxCloneService::new(transport.map_response(|response| response.map(boxed_body)));
        for filter in self.filters.iter().rev() {
            exchange = filter(exchange);
        }

        debug!(filters = self.filters.len(), base_url = ?base_url, "web client built");
        Ok(WebClient { exchange, base_url })
    }
}

/// An HTTP client whose every exchange runs through its filter chain.
///
/// Cloning is cheap and clones share the filters' state (token sources,
/// connection pool).
#[derive(Clone)]
pub struct WebClient {
    exchange: BoxExchange,
    base_url: Option<Url>,
}

impl fmt::Debug for WebClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl WebClient {
    pub fn builder() -> WebClientBuilder {
        WebClientBuilder::default()
    }

    /// Build a client with the filters `config` asks for.
    ///
    /// - `basic`: `basic_if_needed(username, password)`
    /// - `digest`: `digest_if_needed(username, password)`
    /// - `bearer`: attach `access_token` (if set) and, when a `token_endpoint`
    ///   is configured, refresh it on a 401 with the refresh token grant (if a
    ///   `refresh_token` is set) or the client credentials grant.
    pub fn from_config(config: &ClientConfig) -> Result<WebClient, FromConfigError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or(FromConfigError::MissingBaseUrl)?;
        let mut builder = WebClient::builder().base_url(base_url);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        let Some(auth_type) = config.auth_type else {
            return builder.build();
        };
        let required = |value: &Option<String>, field: &'static str| {
            value.clone().ok_or(FromConfigError::MissingCredential {
                auth_type: auth_type.as_str(),
                field,
            })
        };

        builder = match auth_type {
            AuthType::Basic => builder.filter(basic_if_needed(
                required(&config.username, "username")?,
                required(&config.password, "password")?,
            )),
            AuthType::Digest => builder.filter(digest_if_needed(
                required(&config.username, "username")?,
                required(&config.password, "password")?,
            )),
            AuthType::Bearer => {
                let mut bearer = builder;
                if config.access_token.is_none() && config.token_endpoint.is_none() {
                    return Err(FromConfigError::MissingCredential {
                        auth_type: auth_type.as_str(),
                        field: "access_token",
                    });
                }

                if let Some(token) = &config.access_token {
                    let layer = AuthorizationLayer::bearer(token).map_err(|_| {
                        FromConfigError::InvalidCredential {
                            auth_type: auth_type.as_str(),
                            field: "access_token",
                        }
                    })?;
                    bearer = bearer.filter(layer);
                }

                if let Some(endpoint) = &config.token_endpoint {
                    let client_id = required(&config.client_id, "client_id")?;
                    let grant = match (&config.refresh_token, &config.client_secret) {
                        (Some(refresh_token), _) => Grant::RefreshToken {
                            client_id,
                            refresh_token: refresh_token.clone(),
                            scope: config.scope.clone(),
                        },
                        (None, Some(client_secret)) => Grant::ClientCredentials {
                            client_id,
                            client_secret: client_secret.clone(),
                        },
                        (None, None) => {
                            return Err(FromConfigError::MissingCredential {
                                auth_type: auth_type.as_str(),
                                field: "refresh_token",
                            });
                        }
                    };

                    let mut transport = HttpTransport::new();
                    if let Some(timeout) = config.timeout() {
                        transport = transport.with_timeout(timeout);
                    }
                    let source = SingleFlight::new(OAuthTokenSource::new(
                        transport,
                        endpoint.clone(),
                        grant,
                    ));
                    bearer = bearer.filter(refresh_if_needed(source));
                }
                bearer
            }
        };

        builder.build()
    }

    pub fn get(&self, target: &str) -> RequestSpec {
        self.request(Method::GET, target)
    }

    pub fn post(&self, target: &str) -> RequestSpec {
        self.request(Method::POST, target)
    }

    pub fn put(&self, target: &str) -> RequestSpec {
        self.request(Method::PUT, target)
    }

    pub fn delete(&self, target: &str) -> RequestSpec {
        self.request(Method::DELETE, target)
    }

    /// Start a request. `target` is either absolute or relative to the base
    /// URL.
    pub fn request(&self, method: Method, target: &str) -> RequestSpec {
        RequestSpec {
            exchange: self.exchange.clone(),
            method,
            uri: self.resolve(target),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    fn resolve(&self, target: &str) -> Result<Uri, ExchangeError> {
        let url = match &self.base_url {
            Some(base) => base.join(target),
            None => Url::parse(target),
        }
        .map_err(|e| ExchangeError::InvalidRequest(format!("cannot resolve {target:?}: {e}")))?;

        url.as_str()
            .parse::<Uri>()
            .map_err(|e| ExchangeError::InvalidRequest(format!("invalid URI {url}: {e}")))
    }
}

/// A request being built. Nothing is sent until [`exchange`](Self::exchange)
/// or [`retrieve`](Self::retrieve) is awaited.
pub struct RequestSpec {
    exchange: BoxExchange,
    method: Method,
    uri: Result<Uri, ExchangeError>,
    headers: HeaderMap,
    body: Bytes,
    // First builder error; reported when the request is sent.
    error: Option<ExchangeError>,
}

impl RequestSpec {
    /// Append a header value.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if self.error.is_some() {
            return self;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => {
                let e: http::Error = e.into();
                self.error = Some(ExchangeError::InvalidHeader(e.to_string()));
            }
            (_, Err(e)) => {
                let e: http::Error = e.into();
                self.error = Some(ExchangeError::InvalidHeader(e.to_string()));
            }
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body and set `Content-Type` unless one
    /// was given.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = Bytes::from(body);
                if !self.headers.contains_key(CONTENT_TYPE) {
                    self.headers
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
            }
            Err(e) if self.error.is_none() => {
                self.error = Some(ExchangeError::InvalidRequest(format!(
                    "failed to encode JSON body: {e}"
                )));
            }
            Err(_) => {}
        }
        self
    }

    /// Send the request and return the response, whatever its status.
    pub async fn exchange(self) -> Result<ClientResponse, ExchangeError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut request = Request::builder()
            .method(self.method)
            .uri(self.uri?)
            .body(Full::new(self.body))
            .map_err(|e| ExchangeError::InvalidRequest(e.to_string()))?;
        *request.headers_mut() = self.headers;

        let response = self.exchange.oneshot(request).await?;
        Ok(ClientResponse::new(response))
    }

    /// Send the request and deserialize a success response body as JSON.
    ///
    /// A 4xx or 5xx response is [`ExchangeError::Status`].
    pub async fn retrieve<T: DeserializeOwned>(self) -> Result<ResponseEntity<T>, ExchangeError> {
        self.exchange()
            .await?
            .error_for_status()
            .await?
            .into_entity()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http::header::{ACCEPT, AUTHORIZATION};
    use serde::Deserialize;

    use crate::client::mock::{MockExchange, json_response, response};

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Message {
        message: Option<String>,
    }

    fn builder() -> WebClientBuilder {
        WebClient::builder().base_url("http://localhost:8080/")
    }

    #[tokio::test]
    async fn relative_paths_resolve_against_base_url() {
        let mock = MockExchange::respond_with(vec![response(StatusCode::OK, "OK")]);
        let client = builder().build_with(mock.clone()).unwrap();

        let response = client.get("/messages/1").exchange().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "OK");

        let captured = mock.take_captured_requests();
        assert_eq!(captured[0].method, Method::GET);
        assert_eq!(captured[0].uri, "http://localhost:8080/messages/1");
    }

    #[tokio::test]
    async fn first_filter_added_is_outermost() {
        let mock = MockExchange::respond_with(vec![response(StatusCode::OK, "OK")]);
        let client = builder()
            .filter(AuthorizationLayer::bearer("outer").unwrap())
            .filter(AuthorizationLayer::bearer("inner").unwrap())
            .build_with(mock.clone())
            .unwrap();

        client.get("/").exchange().await.unwrap();

        // The inner filter runs last and its value is what goes out.
        let captured = mock.take_captured_requests();
        assert_eq!(captured[0].headers.get(AUTHORIZATION).unwrap(), "Bearer inner");
    }

    #[tokio::test]
    async fn retrieve_deserializes_success_body() {
        let mock = MockExchange::respond_with(vec![json_response(
            StatusCode::OK,
            r#"{"message":"hello"}"#,
        )]);
        let client = builder().build_with(mock.clone()).unwrap();

        let entity = client
            .get("/messages/1")
            .header(ACCEPT, "application/json")
            .retrieve::<Message>()
            .await
            .unwrap();

        assert_eq!(entity.status, StatusCode::OK);
        assert_eq!(entity.body.message.as_deref(), Some("hello"));
        assert_eq!(
            mock.take_captured_requests()[0].headers.get(ACCEPT).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn retrieve_reports_error_status() {
        let mock = MockExchange::respond_with(vec![response(StatusCode::UNAUTHORIZED, "denied")]);
        let client = builder().build_with(mock.clone()).unwrap();

        let err = client.get("/messages/1").retrieve::<Message>().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn json_body_sets_content_type() {
        let mock = MockExchange::respond_with(vec![response(StatusCode::CREATED, "")]);
        let client = builder().build_with(mock.clone()).unwrap();

        let body = Message {
            message: Some("hi".into()),
        };
        client.post("/messages").json(&body).exchange().await.unwrap();

        let captured = mock.take_captured_requests();
        assert_eq!(captured[0].method, Method::POST);
        assert_eq!(captured[0].headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(&captured[0].body[..], br#"{"message":"hi"}"#);
    }

    #[tokio::test]
    async fn invalid_header_fails_before_sending() {
        let mock = MockExchange::new(vec![]);
        let client = builder().build_with(mock.clone()).unwrap();

        let result = client
            .get("/")
            .header("x-bad", "line\nbreak")
            .exchange()
            .await;

        assert!(matches!(result, Err(ExchangeError::InvalidHeader(_))));
        assert!(mock.take_captured_requests().is_empty());
    }

    #[tokio::test]
    async fn relative_path_without_base_url_is_invalid() {
        let mock = MockExchange::new(vec![]);
        let client = WebClient::builder().build_with(mock.clone()).unwrap();

        let result = client.get("/messages/1").exchange().await;
        assert!(matches!(result, Err(ExchangeError::InvalidRequest(_))));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = WebClient::builder()
            .base_url("not a url")
            .build_with(MockExchange::new(vec![]));
        assert!(matches!(result, Err(FromConfigError::InvalidBaseUrl(_))));
    }

    #[tokio::test]
    async fn from_config_requires_base_url() {
        let result = WebClient::from_config(&ClientConfig::default());
        assert!(matches!(result, Err(FromConfigError::MissingBaseUrl)));
    }

    #[tokio::test]
    async fn from_config_reports_missing_credentials() {
        let config = ClientConfig {
            base_url: Some("http://localhost/".into()),
            auth_type: Some(AuthType::Basic),
            username: Some("rob".into()),
            ..Default::default()
        };

        let result = WebClient::from_config(&config);
        assert!(matches!(
            result,
            Err(FromConfigError::MissingCredential {
                auth_type: "basic",
                field: "password"
            })
        ));
    }

    #[tokio::test]
    async fn from_config_bearer_with_endpoint_requires_a_grant() {
        let config = ClientConfig {
            base_url: Some("http://localhost/".into()),
            auth_type: Some(AuthType::Bearer),
            access_token: Some("token".into()),
            client_id: Some("my-client".into()),
            token_endpoint: Some("http://localhost/oauth/token".into()),
            ..Default::default()
        };

        let result = WebClient::from_config(&config);
        assert!(matches!(
            result,
            Err(FromConfigError::MissingCredential {
                field: "refresh_token",
                ..
            })
        ));
    }
}
