//! `${tag}` log-line templates.
//!
//! A format string is compiled once into literal text and parsed tags.
//! Rendering walks the segments and resolves each tag against the request
//! that just finished. Time tags read the clock while rendering.
//!
//! | Tag | Renders |
//! |---|---|
//! | `time_unix`, `time_unix_nano` | Unix time in seconds / nanoseconds |
//! | `time_rfc3339`, `time_rfc3339_nano` | RFC 3339 local time |
//! | `time_custom` | local time in the configured strftime format |
//! | `id` | `X-Request-ID` of the request, else of the response |
//! | `remote_ip` | [`Request::real_ip`] |
//! | `host`, `uri`, `method`, `path`, `protocol` | request line and host |
//! | `referer`, `user_agent` | the matching request headers |
//! | `status` | numeric response status |
//! | `error` | handler error message, JSON-escaped, unquoted |
//! | `latency`, `latency_human` | handling time in ns / human readable |
//! | `bytes_in` | request `Content-Length`, `0` when absent |
//! | `bytes_out` | response body size |
//! | `header:<name>`, `query:<name>`, `form:<name>`, `cookie:<name>` | lookups by name |
//!
//! Anything else renders as nothing.

use std::fmt::{self, Write};
use std::time::Duration;

use chrono::{Local, SecondsFormat, Utc};
use http::StatusCode;
use http::header::CONTENT_LENGTH;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

const START_TAG: &str = "${";
const END_TAG: &str = "}";
const REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    TimeUnix,
    TimeUnixNano,
    TimeRfc3339,
    TimeRfc3339Nano,
    TimeCustom,
    Id,
    RemoteIp,
    Host,
    Uri,
    Method,
    Path,
    Protocol,
    Referer,
    UserAgent,
    Status,
    Error,
    Latency,
    LatencyHuman,
    BytesIn,
    BytesOut,
    Header(String),
    Query(String),
    Form(String),
    Cookie(String),
    Unknown,
}

impl Tag {
    fn parse(name: &str) -> Self {
        match name {
            "time_unix" => Self::TimeUnix,
            "time_unix_nano" => Self::TimeUnixNano,
            "time_rfc3339" => Self::TimeRfc3339,
            "time_rfc3339_nano" => Self::TimeRfc3339Nano,
            "time_custom" => Self::TimeCustom,
            "id" => Self::Id,
            "remote_ip" => Self::RemoteIp,
            "host" => Self::Host,
            "uri" => Self::Uri,
            "method" => Self::Method,
            "path" => Self::Path,
            "protocol" => Self::Protocol,
            "referer" => Self::Referer,
            "user_agent" => Self::UserAgent,
            "status" => Self::Status,
            "error" => Self::Error,
            "latency" => Self::Latency,
            "latency_human" => Self::LatencyHuman,
            "bytes_in" => Self::BytesIn,
            "bytes_out" => Self::BytesOut,
            _ => {
                if let Some(n) = name.strip_prefix("header:") {
                    Self::Header(n.to_owned())
                } else if let Some(n) = name.strip_prefix("query:") {
                    Self::Query(n.to_owned())
                } else if let Some(n) = name.strip_prefix("form:") {
                    Self::Form(n.to_owned())
                } else if let Some(n) = name.strip_prefix("cookie:") {
                    Self::Cookie(n.to_owned())
                } else {
                    Self::Unknown
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Tag(Tag),
}

/// A compiled log format.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles `format`. Fails when a `${` is never closed.
    pub fn parse(format: &str) -> Result<Self, Error> {
        let mut segments = Vec::new();
        let mut rest = format;

        while let Some(start) = rest.find(START_TAG) {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_owned()));
            }
            let after = &rest[start + START_TAG.len()..];
            let Some(end) = after.find(END_TAG) else {
                return Err(Error::Template(format!(
                    "unclosed `{START_TAG}` at byte {} of {format:?}",
                    format.len() - rest.len() + start,
                )));
            };
            segments.push(Segment::Tag(Tag::parse(&after[..end])));
            rest = &after[end + END_TAG.len()..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_owned()));
        }

        Ok(Self { segments })
    }

    /// Renders the template for one finished request.
    pub(crate) fn render<W: Write>(&self, w: &mut W, ctx: &RenderContext<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => w.write_str(text)?,
                Segment::Tag(tag) => ctx.write_tag(w, tag)?,
            }
        }
        Ok(())
    }
}

/// Everything a tag may resolve against.
pub(crate) struct RenderContext<'a> {
    pub(crate) request: &'a Request,
    pub(crate) response: Option<&'a Response>,
    pub(crate) error: Option<&'a Error>,
    pub(crate) status: StatusCode,
    pub(crate) bytes_out: usize,
    pub(crate) latency: Duration,
    pub(crate) time_format: &'a str,
}

impl RenderContext<'_> {
    fn write_tag<W: Write>(&self, w: &mut W, tag: &Tag) -> fmt::Result {
        let req = self.request;
        match tag {
            Tag::TimeUnix => write!(w, "{}", Utc::now().timestamp()),
            Tag::TimeUnixNano => {
                write!(w, "{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
            }
            Tag::TimeRfc3339 => {
                w.write_str(&Local::now().to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Tag::TimeRfc3339Nano => {
                w.write_str(&Local::now().to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            // Invalid strftime specifiers surface here as a render error.
            Tag::TimeCustom => write!(w, "{}", Local::now().format(self.time_format)),
            Tag::Id => {
                let id = req
                    .header(REQUEST_ID)
                    .or_else(|| self.response.and_then(|res| res.header(REQUEST_ID)))
                    .unwrap_or("");
                w.write_str(id)
            }
            Tag::RemoteIp => w.write_str(&req.real_ip()),
            Tag::Host => w.write_str(req.host()),
            Tag::Uri => w.write_str(req.request_uri()),
            Tag::Method => w.write_str(req.method().as_str()),
            Tag::Path => w.write_str(req.path()),
            Tag::Protocol => w.write_str(req.protocol()),
            Tag::Referer => w.write_str(req.referer()),
            Tag::UserAgent => w.write_str(req.user_agent()),
            Tag::Status => write!(w, "{}", self.status.as_u16()),
            Tag::Error => match self.error {
                Some(err) => write_json_escaped(w, &err.to_string()),
                None => Ok(()),
            },
            Tag::Latency => write!(w, "{}", self.latency.as_nanos()),
            Tag::LatencyHuman => write!(w, "{:?}", self.latency),
            Tag::BytesIn => w.write_str(req.header(CONTENT_LENGTH.as_str()).unwrap_or("0")),
            Tag::BytesOut => write!(w, "{}", self.bytes_out),
            Tag::Header(name) => w.write_str(req.header(name).unwrap_or("")),
            Tag::Query(name) => w.write_str(req.query(name).as_deref().unwrap_or("")),
            Tag::Form(name) => w.write_str(req.form(name).as_deref().unwrap_or("")),
            Tag::Cookie(name) => w.write_str(req.cookie(name).unwrap_or("")),
            Tag::Unknown => Ok(()),
        }
    }
}

/// Writes `s` as a JSON string body: escaped, without the enclosing quotes.
fn write_json_escaped<W: Write>(w: &mut W, s: &str) -> fmt::Result {
    let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
    w.write_str(&quoted[1..quoted.len() - 1])
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn request() -> Request {
        http::Request::post("/search?q=rust&page=2")
            .header("host", "example.com")
            .header("referer", "https://ref.example/")
            .header("user-agent", "curl/8.0")
            .header("x-request-id", "req-1")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("content-length", "10")
            .header("cookie", "session=abc")
            .header("x-custom", "custom-value")
            .header("x-forwarded-for", "203.0.113.5")
            .body(Bytes::from_static(b"name=alice"))
            .unwrap()
            .into()
    }

    fn render(format: &str, ctx: &RenderContext<'_>) -> String {
        let mut out = String::new();
        Template::parse(format).unwrap().render(&mut out, ctx).unwrap();
        out
    }

    fn context<'a>(req: &'a Request, res: Option<&'a Response>, err: Option<&'a Error>) -> RenderContext<'a> {
        RenderContext {
            request: req,
            response: res,
            error: err,
            status: StatusCode::OK,
            bytes_out: 42,
            latency: Duration::from_micros(1500),
            time_format: "%Y",
        }
    }

    #[test]
    fn parse_splits_text_and_tags() {
        let t = Template::parse("a ${method} b${status}").unwrap();
        assert_eq!(
            t.segments,
            vec![
                Segment::Text("a ".into()),
                Segment::Tag(Tag::Method),
                Segment::Text(" b".into()),
                Segment::Tag(Tag::Status),
            ],
        );
        assert!(Template::parse("").unwrap().segments.is_empty());
    }

    #[test]
    fn parse_rejects_unclosed_tag() {
        let err = Template::parse("${method} ${status").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn request_tags() {
        let req = request();
        let ctx = context(&req, None, None);
        let cases = [
            ("${id}", "req-1"),
            ("${remote_ip}", "203.0.113.5"),
            ("${host}", "example.com"),
            ("${uri}", "/search?q=rust&page=2"),
            ("${method}", "POST"),
            ("${path}", "/search"),
            ("${protocol}", "HTTP/1.1"),
            ("${referer}", "https://ref.example/"),
            ("${user_agent}", "curl/8.0"),
            ("${status}", "200"),
            ("${error}", ""),
            ("${latency}", "1500000"),
            ("${latency_human}", "1.5ms"),
            ("${bytes_in}", "10"),
            ("${bytes_out}", "42"),
            ("${header:X-Custom}", "custom-value"),
            ("${query:page}", "2"),
            ("${form:name}", "alice"),
            ("${cookie:session}", "abc"),
            ("${cookie:missing}", ""),
            ("${nonsense}", ""),
            ("${}", ""),
        ];
        for (format, expected) in cases {
            assert_eq!(render(format, &ctx), expected, "format {format}");
        }
    }

    #[test]
    fn defaults_when_absent() {
        let req: Request = http::Request::get("/").body(Bytes::new()).unwrap().into();
        let ctx = context(&req, None, None);
        assert_eq!(render("[${bytes_in}][${id}][${referer}][${remote_ip}]", &ctx), "[0][][][]");
    }

    #[test]
    fn id_falls_back_to_response_header() {
        let req: Request = http::Request::get("/").body(Bytes::new()).unwrap().into();
        let res = Response::builder().header("X-Request-ID", "from-response").text("ok");
        let ctx = context(&req, Some(&res), None);
        assert_eq!(render("${id}", &ctx), "from-response");
    }

    #[test]
    fn error_is_escaped_but_not_quoted() {
        let req = request();
        let err = Error::other("bad \"input\"\nline two");
        let ctx = context(&req, None, Some(&err));
        assert_eq!(render("${error}", &ctx), r#"bad \"input\"\nline two"#);
    }

    #[test]
    fn time_tags_have_expected_shape() {
        let req = request();
        let ctx = context(&req, None, None);

        let unix: i64 = render("${time_unix}", &ctx).parse().unwrap();
        assert!(unix > 1_600_000_000);
        let nanos: i64 = render("${time_unix_nano}", &ctx).parse().unwrap();
        assert!(nanos > unix);

        let rfc = render("${time_rfc3339}", &ctx);
        assert!(chrono::DateTime::parse_from_rfc3339(&rfc).is_ok(), "{rfc}");
        let rfc_nano = render("${time_rfc3339_nano}", &ctx);
        assert!(chrono::DateTime::parse_from_rfc3339(&rfc_nano).is_ok(), "{rfc_nano}");

        assert_eq!(render("${time_custom}", &ctx), Local::now().format("%Y").to_string());
    }

    #[test]
    fn invalid_time_format_fails_rendering() {
        let req = request();
        let mut ctx = context(&req, None, None);
        ctx.time_format = "%Q";
        let template = Template::parse("${time_custom}").unwrap();
        let mut out = String::new();
        assert!(template.render(&mut out, &ctx).is_err());
    }
}
