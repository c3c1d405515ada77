//! Request preprocessing.
//!
//! Decides whether a request asks for a transformation. Only requests that
//! accept exactly `application/json` and carry a non-empty `JQ` header get a
//! [`RawQuery`] attached to their extensions; everything else is proxied
//! verbatim.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};

/// Header carrying the client's query.
pub static JQ_HEADER: HeaderName = HeaderName::from_static("jq");

/// Header carrying the request ID.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub const APPLICATION_JSON: &str = "application/json";

/// Query text exactly as the client sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQuery(String);

impl RawQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attach a [`RawQuery`] when the request asks for a transformation.
pub async fn query_header_middleware(mut request: Request, next: Next) -> Response {
    if let Some(query) = extract_query(request.headers()) {
        tracing::info!(query = %query.as_str(), "Query");
        request.extensions_mut().insert(query);
    }
    next.run(request).await
}

/// The query a request asks for, if any.
pub fn extract_query(headers: &HeaderMap) -> Option<RawQuery> {
    if !has_media_type(headers, &header::ACCEPT, APPLICATION_JSON) {
        return None;
    }
    // Queries may carry UTF-8 string literals, which `to_str` rejects.
    let query = std::str::from_utf8(headers.get(&JQ_HEADER)?.as_bytes()).ok()?;
    if query.is_empty() {
        return None;
    }
    Some(RawQuery::new(query))
}

/// Whether the single media type in header `name` is exactly `expected`.
/// Missing, unparseable and multi-valued headers never match.
pub fn has_media_type(headers: &HeaderMap, name: &HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_media_type)
        .is_some_and(|media_type| media_type == expected)
}

/// Parse `type/subtype[; params]` into a lowercase `type/subtype`.
pub fn parse_media_type(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    if is_token(kind) && is_token(subtype) {
        Some(essence.to_ascii_lowercase())
    } else {
        None
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Request ID assigned to the request, or `-` if there is none.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}
