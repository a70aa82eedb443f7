use std::{net::SocketAddr, time::Duration};

use axum::{
    body::Body,
    http::{Request, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{field, info, info_span, warn, Span};

use crate::{auth, error::AppError, state::AppState, users};

pub const API_PREFIX: &str = "/api/v1";

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}

async fn unknown_route() -> AppError {
    AppError::NotFound
}

fn request_span(req: &Request<Body>) -> Span {
    info_span!(
        "request",
        method = %req.method(),
        path = req.uri().path(),
        status = field::Empty,
    )
}

fn record_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status();
    span.record("status", status.as_u16());
    let latency_ms = latency.as_millis() as u64;
    if status.is_server_error() {
        warn!(latency_ms, "request failed");
    } else {
        info!(latency_ms, "request served");
    }
}

/// Full HTTP surface: `/api/v1/...`, JSON 404 for anything else.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(API_PREFIX, api_routes())
        .fallback(unknown_route)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(record_response),
        )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Serves until ctrl-c, letting in-flight requests finish.
pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
