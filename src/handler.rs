//! Handler and middleware traits, type erasure, and the [`Next`] chain.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in one radix tree per
//! method, so every handler is hidden behind a trait object
//! (`dyn ErasedHandler`):
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.on(Method::GET, "/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch
//! ```
//!
//! Middleware is stored the same way, as `Arc<dyn Middleware>`. At request
//! time the router hands the first middleware a [`Next`] that knows the rest
//! of the stack and the matched endpoint.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{HandlerResult, Responder};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to a [`HandlerResult`].
///
/// `Send + 'static` let tokio move the future across threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl Responder
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Responder + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Responder + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: Responder + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_result() })
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// A link in the request pipeline.
///
/// A middleware receives the request and a [`Next`] for the rest of the
/// chain. It may inspect or replace the request, call `next.run(req)` (or
/// not), and inspect or replace the outcome.
///
/// Implemented for every `async fn(Request, Next) -> HandlerResult`:
///
/// ```rust
/// use watchpost::{HandlerResult, Next, Request};
///
/// async fn passthrough(req: Request, next: Next) -> HandlerResult {
///     let res = next.run(req).await?;
///     Ok(res)
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self)(req, next))
    }
}

/// The remainder of a middleware chain.
///
/// Cloning is cheap; the stack and the endpoint are shared.
#[derive(Clone)]
pub struct Next {
    stack: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(stack: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { stack, index: 0, endpoint }
    }

    /// Runs the rest of the chain.
    ///
    /// Nothing is invoked until the returned future is first polled, so a
    /// handler that panics while being called panics inside the future.
    pub fn run(mut self, req: Request) -> BoxFuture {
        Box::pin(async move {
            match self.stack.get(self.index).cloned() {
                Some(middleware) => {
                    self.index += 1;
                    middleware.handle(req, self).await
                }
                None => self.endpoint.call(req).await,
            }
        })
    }
}
