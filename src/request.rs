//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, HOST, REFERER, USER_AGENT};
use http::{HeaderMap, Method, Uri, Version};

/// Everything about a request except its body and route parameters.
#[derive(Clone)]
struct Head {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
}

/// An incoming HTTP request.
///
/// Cloning is cheap: the head is shared and the body is reference-counted.
/// Middleware relies on this to keep a view of the request after handing
/// it to the next link of the chain.
#[derive(Clone)]
pub struct Request {
    head: Arc<Head>,
    body: Bytes,
    params: Arc<HashMap<String, String>>,
}

impl Request {
    pub(crate) fn from_parts(
        parts: http::request::Parts,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let head = Head {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            remote_addr,
        };
        Self { head: Arc::new(head), body, params: Arc::default() }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = Arc::new(params);
        self
    }

    /// Sets the socket peer address. The server does this for every
    /// connection; tests and embedders can do it by hand.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        Arc::make_mut(&mut self.head).remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn version(&self) -> Version { self.head.version }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.head.remote_addr }

    /// The request target as received: path plus query string.
    pub fn request_uri(&self) -> &str {
        self.head.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// URL path, `/` when the target has none.
    pub fn path(&self) -> &str {
        match self.head.uri.path() {
            "" => "/",
            p => p,
        }
    }

    /// The `Host` header, or the URI authority for absolute-form targets.
    pub fn host(&self) -> &str {
        self.header(HOST.as_str())
            .or_else(|| self.head.uri.authority().map(|a| a.as_str()))
            .unwrap_or("")
    }

    /// Protocol string, e.g. `HTTP/1.1`.
    pub fn protocol(&self) -> &'static str {
        match self.head.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/1.1",
        }
    }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn referer(&self) -> &str {
        self.header(REFERER.as_str()).unwrap_or("")
    }

    pub fn user_agent(&self) -> &str {
        self.header(USER_AGENT.as_str()).unwrap_or("")
    }

    /// Client address as seen through a reverse proxy.
    ///
    /// First entry of `X-Forwarded-For`, then `X-Real-IP`, then the socket
    /// peer address.
    pub fn real_ip(&self) -> String {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return first.to_owned();
            }
        }
        if let Some(real) = self.header("x-real-ip") {
            return real.trim().to_owned();
        }
        self.head.remote_addr.map(|a| a.ip().to_string()).unwrap_or_default()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Percent-decoded query-string parameter. The first occurrence wins.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.head.uri.query()?;
        lookup_urlencoded(query.as_bytes(), name)
    }

    /// Form value: the urlencoded body field when the request carries one,
    /// otherwise the query-string parameter of the same name.
    pub fn form(&self, name: &str) -> Option<String> {
        let urlencoded = self
            .header(CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if urlencoded {
            if let Some(value) = lookup_urlencoded(&self.body, name) {
                return Some(value);
            }
        }
        self.query(name)
    }

    /// Value of the named cookie from the `Cookie` header(s).
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.head
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"'))
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body, None)
    }
}

fn lookup_urlencoded(input: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(input)
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(builder: http::request::Builder, body: &'static str) -> Request {
        builder.body(Bytes::from_static(body.as_bytes())).unwrap().into()
    }

    #[test]
    fn path_and_uri() {
        let req = request(http::Request::get("/users/42?tab=posts&x=1"), "");
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.request_uri(), "/users/42?tab=posts&x=1");
        assert_eq!(req.query("tab").as_deref(), Some("posts"));
        assert_eq!(req.query("missing"), None);
        assert_eq!(req.protocol(), "HTTP/1.1");
    }

    #[test]
    fn host_prefers_header() {
        let req = request(
            http::Request::get("http://origin.internal/x").header("host", "example.com"),
            "",
        );
        assert_eq!(req.host(), "example.com");

        let req = request(http::Request::get("http://origin.internal/x"), "");
        assert_eq!(req.host(), "origin.internal");
    }

    #[test]
    fn real_ip_order() {
        let addr: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        let req = request(http::Request::get("/"), "").with_remote_addr(addr);
        assert_eq!(req.real_ip(), "10.0.0.9");

        let req = request(http::Request::get("/").header("x-real-ip", "192.0.2.7"), "")
            .with_remote_addr(addr);
        assert_eq!(req.real_ip(), "192.0.2.7");

        let req = request(
            http::Request::get("/")
                .header("x-forwarded-for", "203.0.113.1, 10.0.0.1")
                .header("x-real-ip", "192.0.2.7"),
            "",
        );
        assert_eq!(req.real_ip(), "203.0.113.1");
    }

    #[test]
    fn form_reads_body_then_query() {
        let req = request(
            http::Request::post("/login?user=fromquery&next=%2Fhome")
                .header("content-type", "application/x-www-form-urlencoded"),
            "user=alice&note=hello+world",
        );
        assert_eq!(req.form("user").as_deref(), Some("alice"));
        assert_eq!(req.form("note").as_deref(), Some("hello world"));
        assert_eq!(req.form("next").as_deref(), Some("/home"));
        assert_eq!(req.form("nothing"), None);
    }

    #[test]
    fn form_ignores_non_form_bodies() {
        let req = request(
            http::Request::post("/").header("content-type", "application/json"),
            "user=alice",
        );
        assert_eq!(req.form("user"), None);
    }

    #[test]
    fn cookies() {
        let req = request(
            http::Request::get("/").header("cookie", "session=abc123; theme=\"dark\""),
            "",
        );
        assert_eq!(req.cookie("session"), Some("abc123"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn clones_share_the_head() {
        let req = request(http::Request::get("/").header("x-a", "1"), "body");
        let copy = req.clone();
        assert!(Arc::ptr_eq(&req.head, &copy.head));
        assert_eq!(copy.body(), b"body");
        assert_eq!(copy.header("X-A"), Some("1"));
    }
}
