//! Radix-tree request router with a middleware stack.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered
//! with [`Router::layer`] wraps every route, including the not-found
//! fallback, so unmatched requests are observed like any other.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, BoxedMiddleware, Handler, Middleware, Next};
use crate::request::Request;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or drive it directly with [`Router::call`].
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    middleware: Arc<[BoxedMiddleware]>,
    fallback: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            middleware: Vec::new().into(),
            fallback: not_found.into_boxed_handler(),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use http::Method;
    /// # use watchpost::{Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or collides with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Wrap every route in `middleware`. The first layer registered is the
    /// outermost: it sees the request first and the outcome last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let mut stack = self.middleware.to_vec();
        stack.push(Arc::new(middleware));
        self.middleware = stack.into();
        self
    }

    /// Runs one request through the middleware stack and the matched route.
    pub fn call(&self, req: Request) -> BoxFuture {
        let (endpoint, req) = match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => (handler, req.with_params(params)),
            None => (Arc::clone(&self.fallback), req),
        };
        Next::new(Arc::clone(&self.middleware), endpoint).run(req)
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

async fn not_found(_req: Request) -> Result<&'static str, Error> {
    Err(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::response::{HandlerResult, Response};

    fn get(uri: &str) -> Request {
        http::Request::get(uri).body(Bytes::new()).unwrap().into()
    }

    async fn user(req: Request) -> String {
        format!("user {}", req.param("id").unwrap_or("?"))
    }

    #[tokio::test]
    async fn routes_with_params() {
        let app = Router::new().on(Method::GET, "/users/{id}", user);
        let res = app.call(get("/users/42")).await.unwrap();
        assert_eq!(res.body(), b"user 42");
    }

    #[tokio::test]
    async fn unmatched_is_not_found_error() {
        let app = Router::new().on(Method::GET, "/users/{id}", user);
        let err = app.call(get("/nope")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn layers_run_outermost_first() {
        async fn outer(req: Request, next: Next) -> HandlerResult {
            let res = next.run(req).await?;
            Ok(Response::text(format!("outer({})", String::from_utf8_lossy(res.body()))))
        }
        async fn inner(req: Request, next: Next) -> HandlerResult {
            let res = next.run(req).await?;
            Ok(Response::text(format!("inner({})", String::from_utf8_lossy(res.body()))))
        }

        let app = Router::new()
            .on(Method::GET, "/users/{id}", user)
            .layer(outer)
            .layer(inner);
        let res = app.call(get("/users/7")).await.unwrap();
        assert_eq!(res.body(), b"outer(inner(user 7))");
    }
}
