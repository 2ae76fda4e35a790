//! Queue-driven exchange service used by the unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use tower::Service;

use super::error::ExchangeError;

/// Records made by the mock exchange for later assertion.
#[derive(Debug)]
pub(crate) struct CapturedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What the mock does with the next request.
pub(crate) enum Reply {
    Respond(Response<Full<Bytes>>),
    Fail(ExchangeError),
}

impl From<Response<Full<Bytes>>> for Reply {
    fn from(response: Response<Full<Bytes>>) -> Self {
        Reply::Respond(response)
    }
}

/// A mock exchange that returns pre-configured replies in order and
/// captures incoming requests.
#[derive(Clone)]
pub(crate) struct MockExchange {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockExchange {
    pub fn new(replies: Vec<Reply>) -> Self {
        MockExchange {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn respond_with(responses: Vec<Response<Full<Bytes>>>) -> Self {
        Self::new(responses.into_iter().map(Reply::from).collect())
    }

    /// Drain and return all captured requests.
    pub fn take_captured_requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().drain(..).collect()
    }
}

impl Service<Request<Full<Bytes>>> for MockExchange {
    type Response = Response<Full<Bytes>>;
    type Error = ExchangeError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, ExchangeError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockExchange: ran out of configured replies");
        let captured = self.captured.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.unwrap().to_bytes();
            captured.lock().unwrap().push(CapturedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });

            match reply {
                Reply::Respond(response) => Ok(response),
                Reply::Fail(err) => Err(err),
            }
        })
    }
}

pub(crate) fn response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

pub(crate) fn json_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_owned())))
        .unwrap()
}

pub(crate) fn challenge_response(www_authenticate: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(WWW_AUTHENTICATE, www_authenticate)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

pub(crate) fn get_request(uri: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}
