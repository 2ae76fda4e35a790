//! The request/response model shared by every filter.
//!
//! Requests carry a [`Full<Bytes>`] body so they can be duplicated for a
//! retry without copying the payload (`Bytes` is reference counted).
//! Responses carry a type-erased [`ResponseBody`] so a transport, a mock, and
//! any body-transforming layer all produce the same type.

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body::Body;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use tower::util::BoxCloneService;

use super::error::{BoxError, ExchangeError};

/// An outgoing request as seen by the filter chain.
pub type ExchangeRequest = Request<Full<Bytes>>;

/// The type-erased body of an incoming response.
pub type ResponseBody = BoxBody<Bytes, BoxError>;

/// An incoming response as seen by the filter chain.
pub type ExchangeResponse = Response<ResponseBody>;

/// A type-erased exchange function: a request in, a response (or error) out.
pub type BoxExchange = BoxCloneService<ExchangeRequest, ExchangeResponse, ExchangeError>;

/// Erase the concrete body type of a response body.
pub fn boxed_body<B>(body: B) -> ResponseBody
where
    B: Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed()
}

/// Produce a new request with the same method, URI, version, headers and body.
///
/// `http::Request` isn't `Clone`, and a filter must not modify a request it
/// has already forwarded, so any retry starts from a duplicate. Extensions are
/// not carried over.
pub fn duplicate_request<B: Clone>(req: &Request<B>) -> Request<B> {
    let mut duplicate = Request::new(req.body().clone());
    *duplicate.method_mut() = req.method().clone();
    *duplicate.uri_mut() = req.uri().clone();
    *duplicate.version_mut() = req.version();
    *duplicate.headers_mut() = req.headers().clone();
    duplicate
}

/// The class of an HTTP status code, following the first digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 1xx
    Informational,
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
}

impl StatusClass {
    /// Classify a status code. Codes outside 100..=599 have no class.
    pub fn of(status: StatusCode) -> Option<Self> {
        match status.as_u16() {
            100..=199 => Some(StatusClass::Informational),
            200..=299 => Some(StatusClass::Success),
            300..=399 => Some(StatusClass::Redirection),
            400..=499 => Some(StatusClass::ClientError),
            500..=599 => Some(StatusClass::ServerError),
            _ => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, StatusClass::ClientError | StatusClass::ServerError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ACCEPT, AUTHORIZATION};
    use http::{Method, Version};

    #[test]
    fn duplicate_keeps_method_uri_headers_and_body() {
        let original = Request::builder()
            .method(Method::PUT)
            .uri("http://api.example.com/messages/1?draft=true")
            .version(Version::HTTP_11)
            .header(ACCEPT, "application/json")
            .header(ACCEPT, "text/plain")
            .body(Full::new(Bytes::from_static(b"payload")))
            .unwrap();

        let mut duplicate = duplicate_request(&original);
        duplicate
            .headers_mut()
            .insert(AUTHORIZATION, "Bearer token".parse().unwrap());

        assert_eq!(duplicate.method(), Method::PUT);
        assert_eq!(duplicate.uri(), original.uri());
        assert_eq!(duplicate.headers().get_all(ACCEPT).iter().count(), 2);

        // The original is untouched by changes to the duplicate.
        assert!(original.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn status_classes_follow_first_digit() {
        assert_eq!(
            StatusClass::of(StatusCode::CONTINUE),
            Some(StatusClass::Informational)
        );
        assert_eq!(StatusClass::of(StatusCode::OK), Some(StatusClass::Success));
        assert_eq!(
            StatusClass::of(StatusCode::FOUND),
            Some(StatusClass::Redirection)
        );
        assert_eq!(
            StatusClass::of(StatusCode::UNAUTHORIZED),
            Some(StatusClass::ClientError)
        );
        assert_eq!(
            StatusClass::of(StatusCode::BAD_GATEWAY),
            Some(StatusClass::ServerError)
        );
        assert_eq!(StatusClass::of(StatusCode::from_u16(799).unwrap()), None);
    }

    #[test]
    fn only_4xx_and_5xx_are_errors() {
        assert!(StatusClass::ClientError.is_error());
        assert!(StatusClass::ServerError.is_error());
        assert!(!StatusClass::Redirection.is_error());
    }
}
