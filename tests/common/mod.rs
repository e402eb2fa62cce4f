#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use tracing::level_filters::LevelFilter;
use watchpost::sink::MemorySink;
use watchpost::{Error, Request, Response, Router};

pub fn sink(level: LevelFilter) -> Arc<MemorySink> {
    Arc::new(MemorySink::new(level))
}

pub fn get(uri: &str) -> Request {
    http::Request::get(uri).body(Bytes::new()).unwrap().into()
}

/// Routes shared by the integration tests.
pub fn routes() -> Router {
    Router::new()
        .on(Method::GET, "/ok", ok)
        .on(Method::GET, "/created", created)
        .on(Method::GET, "/forbidden", forbidden)
        .on(Method::GET, "/fail", fail)
        .on(Method::GET, "/panic", panics)
}

async fn ok(_req: Request) -> &'static str {
    "ok"
}

async fn created(_req: Request) -> Response {
    Response::builder()
        .status(StatusCode::CREATED)
        .header("x-request-id", "resp-77")
        .text("made")
}

async fn forbidden(_req: Request) -> StatusCode {
    StatusCode::FORBIDDEN
}

async fn fail(_req: Request) -> Result<Response, Error> {
    Err(Error::http(StatusCode::UNPROCESSABLE_ENTITY, "bad \"name\" field"))
}

async fn panics(_req: Request) -> Response {
    panic!("handler exploded");
}
