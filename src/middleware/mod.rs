//! Built-in middleware.
//!
//! - [`logger`]: one templated line per request, written to a [`Sink`](crate::sink::Sink)
//! - [`recover`]: turns handler panics into errors
//!
//! Both are plain values built once from a config and registered with
//! [`Router::layer`](crate::Router::layer). Registration order decides
//! nesting. With the logger registered first (outermost) a recovered panic
//! is logged like any other `500`:
//!
//! ```rust
//! use std::sync::Arc;
//! use http::Method;
//! use watchpost::{Request, Router};
//! use watchpost::middleware::{LoggerConfig, RecoverConfig, logger, recover};
//! use watchpost::sink::TracingSink;
//!
//! let sink = Arc::new(TracingSink::new());
//! let app = Router::new()
//!     .on(Method::GET, "/", |_: Request| async { "ok" })
//!     .layer(logger(LoggerConfig::default().with_sink(sink.clone()))?)
//!     .layer(recover(RecoverConfig::new().with_sink(sink)));
//! # Ok::<(), watchpost::Error>(())
//! ```

pub mod logger;
pub mod recover;
pub mod template;

mod pool;

pub use logger::{Logger, LoggerConfig, logger};
pub use recover::{PanicCallback, Recover, RecoverConfig, recover};
pub use template::Template;
