//! Outgoing HTTP response type and the conversion traits handlers return through.
//!
//! Build a [`Response`] in your handler and return it, or return a
//! `Result<_, E>` and let the error travel up the middleware chain.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

use crate::error::Error;

/// What every link of a middleware chain produces.
pub type HandlerResult = Result<Response, Error>;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use http::StatusCode;
/// use watchpost::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK, headers: HeaderMap::new() }
    }

    /// The response the client receives when `err` ends a request: the
    /// error's status with its message as a plain-text body.
    pub fn for_error(err: &Error) -> Self {
        Self::builder().status(err.status()).text(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Number of body bytes sent to the client.
    pub fn size(&self) -> usize { self.body.len() }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Self::for_error(&err)
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Appends a header. Names or values that are not valid HTTP are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) =
            (HeaderName::try_from(name), HeaderValue::try_from(value))
        {
            self.headers.append(name, value);
        }
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish("application/json", body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", Bytes::from(body.into()))
    }

    /// Terminate with a body of any content type.
    pub fn bytes(self, content_type: &'static str, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new() }
    }

    fn finish(mut self, content_type: &'static str, body: Bytes) -> Response {
        if let Ok(value) = HeaderValue::try_from(content_type) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        Response { status: self.status, headers: self.headers, body }
    }
}

// ── IntoResponse / Responder ──────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// What a handler may return: anything that is a response, or a `Result`
/// whose error becomes the handler error seen by middleware.
pub trait Responder {
    fn into_result(self) -> HandlerResult;
}

impl Responder for Response {
    fn into_result(self) -> HandlerResult { Ok(self) }
}

impl Responder for &'static str {
    fn into_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl Responder for String {
    fn into_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl Responder for StatusCode {
    fn into_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl<T, E> Responder for Result<T, E>
where
    T: IntoResponse,
    E: Into<Error>,
{
    fn into_result(self) -> HandlerResult {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}
