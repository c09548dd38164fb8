use std::net::SocketAddr;

use axum::{extract::DefaultBodyLimit, response::Response, Router};
use color_eyre::eyre::Context as _;
use tokio::net::TcpListener;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::{AppState, Result};

pub(crate) mod api;
pub(crate) mod cmd;
pub(crate) mod cookies;
pub(crate) mod errors;
mod routes;
pub(crate) mod session;
mod trace;

#[cfg(test)]
pub(crate) mod test_helpers;

pub(crate) use errors::ServerError;

pub(crate) type ResponseResult<T = Response> = Result<T, ServerError>;

/// Room for a 5 MB photo plus the rest of the multipart body.
const BODY_LIMIT_BYTES: usize = 6 * 1024 * 1024;

pub(crate) fn app(app_state: AppState) -> Router {
    let tracer = trace::Tracer;
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(tracer)
        .on_response(tracer);

    routes::make_router()
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(trace_layer)
        .layer(CookieManagerLayer::new())
}

pub(crate) async fn run_server(app_state: AppState) -> Result<()> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let port: u16 = port.parse().wrap_err("PORT must be a number")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Starting server on port {}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err("Failed to open port")?;

    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app(app_state))
        .await
        .wrap_err("Failed to run server")
}
