//! Single-host reverse proxy transport.
//!
//! Every request is forwarded to one backend. The upstream response is
//! handed to the [`Transformer`] before it goes back to the client.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Response, Uri},
    response::IntoResponse,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::middleware::RawQuery;
use crate::transformer::Transformer;

/// Headers that only make sense for a single connection.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

pub struct ReverseProxy {
    client: reqwest::Client,
    backend: Url,
    transformer: Transformer,
}

impl ReverseProxy {
    /// Create a proxy for `backend`, which must be an absolute http(s) URL.
    pub fn new(backend: Url, transformer: Transformer, config: &ProxyConfig) -> ProxyResult<Self> {
        if !matches!(backend.scheme(), "http" | "https") || backend.host_str().is_none() {
            return Err(ProxyError::internal_error(format!(
                "Backend must be an http(s) URL with a host, got {}",
                backend
            )));
        }

        // Redirects go back to the client untouched; environment proxies are ignored.
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(interval) = config.tcp_keepalive() {
            builder = builder.tcp_keepalive(interval);
        }
        if let Some(timeout) = config.upstream_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            ProxyError::internal_error(format!("Failed to build upstream client: {}", e))
        })?;

        Ok(Self {
            client,
            backend,
            transformer,
        })
    }

    pub fn backend(&self) -> &Url {
        &self.backend
    }

    /// Upstream URL for a frontend request URI.
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.backend.clone();
        url.set_path(&join_paths(self.backend.path(), uri.path()));

        let backend_query = self.backend.query().filter(|q| !q.is_empty());
        let request_query = uri.query().filter(|q| !q.is_empty());
        let query = match (backend_query, request_query) {
            (Some(base), Some(extra)) => Some(format!("{}&{}", base, extra)),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        };
        url.set_query(query.as_deref());
        url
    }

    /// Forward `request` upstream and run the response through the transformer.
    pub async fn forward(&self, request: Request) -> ProxyResult<Response<Body>> {
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let query = request.extensions().get::<RawQuery>().cloned();

        let (parts, body) = request.into_parts();
        let url = self.target_url(&parts.uri);
        tracing::info!(method = %parts.method, upstream = %url, "Forwarding request");

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        if let Some(ip) = client_ip {
            append_forwarded_for(&mut headers, ip);
        }

        let mut outbound = self.client.request(parts.method, url).headers(headers);
        if !body.is_end_stream() {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await.map_err(|e| {
            tracing::error!(error = %e, "Upstream request failed");
            ProxyError::from(e)
        })?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        self.transformer
            .modify_response(query.as_ref(), response)
            .await
    }
}

/// Fallback handler: every route is proxied.
pub async fn proxy_handler(
    State(proxy): State<Arc<ReverseProxy>>,
    request: Request,
) -> Response<Body> {
    match proxy.forward(request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}
