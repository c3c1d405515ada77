//! Router assembly.

use std::sync::Arc;

use axum::{middleware, Router};
use jqrp_core::{BoundedEvaluator, CompiledQueryCache, JqCompiler};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyResult;
use crate::middleware::{query_header_middleware, REQUEST_ID_HEADER};
use crate::proxy::{proxy_handler, ReverseProxy};
use crate::telemetry::trace_layer;
use crate::transformer::Transformer;

/// Wire the jq pipeline and the transport for `backend`.
pub fn build_proxy(backend: Url, config: &ProxyConfig) -> ProxyResult<Arc<ReverseProxy>> {
    let cache = Arc::new(CompiledQueryCache::new(
        Arc::new(JqCompiler::new()),
        config.cache_capacity(),
    ));
    let evaluator = BoundedEvaluator::new(cache, config.eval_deadline());
    let transformer = Transformer::new(evaluator, config.max_body_size);
    Ok(Arc::new(ReverseProxy::new(backend, transformer, config)?))
}

/// Every path and method goes to the proxy.
///
/// Layers, outermost first: request ID assignment, tracing, request ID
/// propagation, the optional request timeout, query header parsing.
pub fn create_router(proxy: Arc<ReverseProxy>, config: &ProxyConfig) -> Router {
    let mut router = Router::new()
        .fallback(proxy_handler)
        .with_state(proxy)
        .layer(middleware::from_fn(query_header_middleware));

    if let Some(timeout) = config.request_timeout() {
        router = router.layer(TimeoutLayer::new(timeout));
    }

    router
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone()))
        .layer(trace_layer())
        .layer(SetRequestIdLayer::new(
            REQUEST_ID_HEADER.clone(),
            MakeRequestUuid,
        ))
}
