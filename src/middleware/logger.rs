//! Request logging middleware.
//!
//! Times each request, then renders a `${tag}` template (see
//! [`template`](super::template)) and writes the line to a [`Sink`]. Which
//! requests produce a line depends on the sink's verbosity and on
//! [`LoggerConfig::record_fail_request`]:
//!
//! | Sink level | `record_fail_request` | Status < 400 | Status ≥ 400 |
//! |---|---|---|---|
//! | `DEBUG` or more verbose | `false` | debug line | debug line |
//! | `DEBUG` or more verbose | `true` | debug line | error line |
//! | less verbose than `DEBUG` | `false` | nothing, untimed | nothing, untimed |
//! | less verbose than `DEBUG` | `true` | nothing | error line |
//!
//! The handler's outcome is returned untouched. The one exception is a line
//! that fails to render: that request returns [`Error::Render`] instead.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::Level;
use tracing::level_filters::LevelFilter;

use super::pool::BufferPool;
use super::template::{RenderContext, Template};
use crate::error::Error;
use crate::handler::{BoxFuture, Middleware, Next};
use crate::request::Request;
use crate::response::{HandlerResult, Response};
use crate::sink::{SharedSink, Sink};

/// Format used when none is configured.
pub const DEFAULT_FORMAT: &str = "=> ${method} | ${remote_ip} | ${host} | ${uri} | ${bytes_in} B in | \
     ${status} | ${bytes_out} B out | ${latency_human} | ${error}";

/// strftime format for `${time_custom}` when none is configured.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.5f";

/// Configuration for the [`Logger`] middleware.
///
/// The data fields deserialize from any serde format, so a logger can be
/// described in a config file; the sink is attached in code:
///
/// ```rust
/// use std::sync::Arc;
/// use watchpost::middleware::LoggerConfig;
/// use watchpost::sink::TracingSink;
///
/// let config: LoggerConfig = serde_json::from_str(r#"{ "format": "${method} ${status}" }"#)?;
/// let logger = config.with_sink(Arc::new(TracingSink::new())).build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Line template. Empty means [`DEFAULT_FORMAT`].
    pub format: String,

    /// strftime format for `${time_custom}`.
    pub custom_time_format: String,

    /// Also log failing requests (status ≥ 400) at error level when the
    /// sink is less verbose than debug.
    pub record_fail_request: bool,

    /// Without a sink the middleware is a pure passthrough.
    #[serde(skip)]
    pub sink: Option<SharedSink>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_owned(),
            custom_time_format: DEFAULT_TIME_FORMAT.to_owned(),
            record_fail_request: false,
            sink: None,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("format", &self.format)
            .field("custom_time_format", &self.custom_time_format)
            .field("record_fail_request", &self.record_fail_request)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl LoggerConfig {
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.custom_time_format = time_format.into();
        self
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn record_fail_request(mut self, enabled: bool) -> Self {
        self.record_fail_request = enabled;
        self
    }

    /// Compiles the template and sets up the buffer pool.
    pub fn build(self) -> Result<Logger, Error> {
        let format = if self.format.is_empty() { DEFAULT_FORMAT } else { &self.format };
        let template = Template::parse(format)?;

        Ok(Logger {
            inner: Arc::new(Inner {
                template,
                pool: BufferPool::new(),
                time_format: self.custom_time_format,
                record_fail_request: self.record_fail_request,
                sink: self.sink,
            }),
        })
    }
}

/// Builds a [`Logger`] from `config`.
pub fn logger(config: LoggerConfig) -> Result<Logger, Error> {
    config.build()
}

/// Request logging middleware. Register with [`Router::layer`](crate::Router::layer).
///
/// Cloning shares the compiled template and buffer pool.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

struct Inner {
    template: Template,
    pool: BufferPool,
    time_format: String,
    record_fail_request: bool,
    sink: Option<SharedSink>,
}

impl Middleware for Logger {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.observe(req, next).await })
    }
}

impl Inner {
    async fn observe(&self, req: Request, next: Next) -> HandlerResult {
        let Some(sink) = &self.sink else {
            return next.run(req).await;
        };

        if !is_verbose(sink.as_ref()) && !self.record_fail_request {
            return next.run(req).await;
        }

        let view = req.clone();
        let start = Instant::now();
        let result = next.run(req).await;
        let latency = start.elapsed();

        // An error reaches the client as its error response; log what it will see.
        let (status, bytes_out, response, error) = match &result {
            Ok(res) => (res.status_code(), res.size(), Some(res), None),
            Err(err) => {
                let res = Response::for_error(err);
                (res.status_code(), res.size(), None, Some(err))
            }
        };
        let failed = status.as_u16() >= 400;

        if !failed && !is_verbose(sink.as_ref()) {
            return result;
        }

        let ctx = RenderContext {
            request: &view,
            response,
            error,
            status,
            bytes_out,
            latency,
            time_format: &self.time_format,
        };

        let mut buf = self.pool.get();
        if let Err(e) = self.template.render(&mut *buf, &ctx) {
            return Err(Error::Render(e));
        }

        let level = if self.record_fail_request && failed { Level::ERROR } else { Level::DEBUG };
        sink.write_line(level, &buf);

        result
    }
}

fn is_verbose(sink: &dyn Sink) -> bool {
    sink.level() >= LevelFilter::DEBUG
}
