//! Panic recovery middleware.
//!
//! Runs the rest of the chain under [`catch_unwind`](FutureExt::catch_unwind).
//! A panic becomes an ordinary [`Error`] returned up the chain, so the client
//! gets an error response and the connection task survives.
//!
//! On a panic, in order:
//! 1. the `on_panic` callback sees the raw payload,
//! 2. the payload is coerced into an [`Error`],
//! 3. the sink gets one error line tagged `[PANIC RECOVER]`,
//! 4. the error is returned.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::Level;

use crate::error::{Error, PanicError};
use crate::handler::{BoxFuture, Middleware, Next};
use crate::request::Request;
use crate::sink::SharedSink;

/// Called with the raw payload of every recovered panic.
pub type PanicCallback = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

/// Prefix of the line written to the sink.
const PANIC_TAG: &str = "[PANIC RECOVER]";

/// Configuration for the [`Recover`] middleware. Both fields are optional.
#[derive(Clone, Default)]
pub struct RecoverConfig {
    pub sink: Option<SharedSink>,
    pub on_panic: Option<PanicCallback>,
}

impl fmt::Debug for RecoverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverConfig")
            .field("sink", &self.sink.is_some())
            .field("on_panic", &self.on_panic.is_some())
            .finish()
    }
}

impl RecoverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the panic callback. It runs synchronously on the request task;
    /// a callback that panics is not caught.
    pub fn on_panic<F>(mut self, callback: F) -> Self
    where
        F: Fn(&(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.on_panic = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Recover {
        Recover { config: Arc::new(self) }
    }
}

/// Builds a [`Recover`] middleware from `config`.
pub fn recover(config: RecoverConfig) -> Recover {
    config.build()
}

/// Panic recovery middleware. Register with [`Router::layer`](crate::Router::layer).
#[derive(Clone, Debug)]
pub struct Recover {
    config: Arc<RecoverConfig>,
}

impl Middleware for Recover {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let config = Arc::clone(&self.config);
        Box::pin(async move {
            match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(config.recovered(payload)),
            }
        })
    }
}

impl RecoverConfig {
    fn recovered(&self, payload: Box<dyn Any + Send>) -> Error {
        if let Some(callback) = &self.on_panic {
            callback(&*payload);
        }

        let err = coerce(payload);

        if let Some(sink) = &self.sink {
            sink.write_line(Level::ERROR, &format!("{PANIC_TAG} {err}"));
        }
        err
    }
}

/// Turns a panic payload into an [`Error`].
///
/// Payloads that already are errors are kept as they are. String payloads
/// (every `panic!("…")`) keep their message. Anything else has no textual
/// form and gets a placeholder message.
pub fn coerce(payload: Box<dyn Any + Send>) -> Error {
    let payload = match payload.downcast::<Error>() {
        Ok(err) => return *err,
        Err(p) => p,
    };
    let payload = match payload.downcast::<Box<dyn std::error::Error + Send + Sync>>() {
        Ok(err) => return Error::Other(*err),
        Err(p) => p,
    };
    let payload = match payload.downcast::<PanicError>() {
        Ok(err) => return Error::Panic(*err),
        Err(p) => p,
    };
    let payload = match payload.downcast::<std::io::Error>() {
        Ok(err) => return Error::Io(*err),
        Err(p) => p,
    };

    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_owned()
    };
    Error::Panic(PanicError::new(message))
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, panic_any};

    use super::*;

    fn payload_of(f: impl FnOnce() + std::panic::UnwindSafe) -> Box<dyn Any + Send> {
        catch_unwind(f).unwrap_err()
    }

    #[test]
    fn coerces_string_payloads() {
        let err = coerce(payload_of(|| panic!("static message")));
        assert_eq!(err.to_string(), "static message");
        assert!(matches!(err, Error::Panic(_)));

        let n = 7;
        let err = coerce(payload_of(move || panic!("formatted {n}")));
        assert_eq!(err.to_string(), "formatted 7");
    }

    #[test]
    fn keeps_error_payloads() {
        let err = coerce(payload_of(|| panic_any(Error::NotFound)));
        assert!(matches!(err, Error::NotFound));

        let boxed: Box<dyn std::error::Error + Send + Sync> = "division by zero".into();
        let err = coerce(Box::new(boxed));
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(err.to_string(), "division by zero");

        let err = coerce(Box::new(std::io::Error::other("disk gone")));
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn opaque_payloads_still_become_errors() {
        struct Opaque;
        let err = coerce(Box::new(Opaque));
        assert_eq!(err.to_string(), "Box<dyn Any>");

        let err = coerce(Box::new(Option::<String>::None));
        assert!(matches!(err, Error::Panic(_)));
    }
}
