//! Unified error type.
//!
//! Every failure that can travel through a middleware chain is an [`Error`]:
//! errors returned by handlers, recovered panics, unmatched routes, and the
//! infrastructure failures of the server itself. Each variant knows which
//! HTTP status it turns into when it finally reaches the client.

use std::fmt;

use http::StatusCode;

/// The error type threaded through handlers, middleware and the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An application error with an explicit status (`422`, `403`, …).
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// No route matched the request.
    #[error("not found")]
    NotFound,

    /// A handler panicked and the panic was recovered.
    #[error(transparent)]
    Panic(#[from] PanicError),

    /// A log format could not be compiled.
    #[error("invalid template: {0}")]
    Template(String),

    /// A log line could not be rendered.
    #[error("render: {0}")]
    Render(#[from] fmt::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error a handler chose to return.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Application error with the given status and message.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// Wraps an arbitrary error. Its status is `500 Internal Server Error`.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Other(err.into())
    }

    /// The status the client receives when this error ends a request.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            Self::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A panic payload coerced into an error.
///
/// Holds the textual representation of the payload: the message of a
/// `panic!("…")`, or a placeholder for payloads that carry no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PanicError {}
