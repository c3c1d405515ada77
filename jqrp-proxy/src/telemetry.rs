//! Tracing setup.
//!
//! JSON logs filtered through `RUST_LOG`. Every request gets a span carrying
//! its request ID, so all events emitted while handling it are tagged.

use axum::http::Request;
use tower_http::trace::{HttpMakeClassifier, MakeSpan, TraceLayer};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ProxyError, ProxyResult};
use crate::middleware::request_id;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "jqrp_proxy=info,jqrp_core=info,tower_http=info,warn";

/// Install the global subscriber. Call once at startup.
pub fn init_tracing() -> ProxyResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| ProxyError::internal_error(format!("Failed to init subscriber: {}", e)))
}

/// Span per request, tagged with the request ID assigned upstream of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            request_id = %request_id(request.headers()),
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// HTTP trace layer using [`RequestSpan`].
pub fn trace_layer() -> TraceLayer<HttpMakeClassifier, RequestSpan> {
    TraceLayer::new_for_http().make_span_with(RequestSpan)
}
