//! Logger and panic recovery in front of two routes.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8080/test1     # logged at debug
//!   curl http://localhost:8080/test2     # panics, recovered, 500

use std::sync::Arc;

use http::Method;
use tracing_subscriber::EnvFilter;
use watchpost::middleware::{LoggerConfig, RecoverConfig, logger, recover};
use watchpost::sink::TracingSink;
use watchpost::{Error, Request, Router, Server};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let sink = Arc::new(TracingSink::new());

    let app = Router::new()
        .on(Method::GET, "/test1", test1)
        .on(Method::GET, "/test2", test2)
        .layer(logger(LoggerConfig::default().with_sink(sink.clone()))?)
        .layer(recover(RecoverConfig::new().with_sink(sink).on_panic(|payload| {
            let text = payload
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| payload.downcast_ref::<&str>().copied())
                .unwrap_or("non-text payload");
            eprintln!("on_panic: {text}");
        })));

    Server::bind("0.0.0.0:8080")?.serve(app).await
}

async fn test1(_req: Request) -> &'static str {
    "success test1"
}

async fn test2(req: Request) -> String {
    // Divides by zero unless `?a=` says otherwise.
    let a: i32 = req.query("a").and_then(|a| a.parse().ok()).unwrap_or(1);
    let n = 1 / (a - 1);
    format!("success test2 {n}")
}
