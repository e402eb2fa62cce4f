//! # watchpost
//!
//! Request logging and panic recovery for a small hyper-based HTTP pipeline.
//!
//! Two middleware values sit between the router and your handlers:
//!
//! - [`middleware::Logger`] times each request and writes one templated line
//!   (`"${method} ${path} ${status} ${latency_human}"`) to a [`sink::Sink`],
//!   at debug level, or at error level for failing requests when only
//!   failures are recorded.
//! - [`middleware::Recover`] catches a panicking handler and returns the
//!   panic as an [`Error`], so the client gets a `500` and the server keeps
//!   going.
//!
//! The pipeline around them is deliberately thin: radix-tree routing,
//! `async fn` handlers, `async fn` middleware, and a hyper server with
//! graceful shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use http::{Method, StatusCode};
//! use watchpost::middleware::{LoggerConfig, RecoverConfig, logger, recover};
//! use watchpost::sink::TracingSink;
//! use watchpost::{Error, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let sink = Arc::new(TracingSink::new());
//!
//!     let app = Router::new()
//!         .on(Method::GET, "/users/{id}", get_user)
//!         .layer(logger(LoggerConfig::default().with_sink(sink.clone()))?)
//!         .layer(recover(RecoverConfig::new().with_sink(sink)));
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     match req.param("id") {
//!         Some("0") => Err(Error::http(StatusCode::NOT_FOUND, "no such user")),
//!         Some(id) => Ok(Response::json(format!(r#"{{"id":"{id}"}}"#))),
//!         None => Err(Error::NotFound),
//!     }
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod sink;

pub use error::{Error, PanicError};
pub use handler::{BoxFuture, Handler, Middleware, Next};
pub use request::Request;
pub use response::{HandlerResult, IntoResponse, Responder, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
