//! Response transformation hook.
//!
//! Called once per proxied response. Responses without a query, and
//! non-2xx responses, pass through untouched. Otherwise the body is buffered,
//! decoded, run through the query and rewritten. A failure at any step
//! leaves the upstream response unused and is returned to the caller.

use axum::{
    body::Body,
    http::{header, HeaderValue, Response},
};
use jqrp_core::{decode_single_root, rewrite, BoundedEvaluator};

use crate::error::{ProxyError, ProxyResult};
use crate::middleware::{has_media_type, RawQuery, APPLICATION_JSON};

#[derive(Debug, Clone)]
pub struct Transformer {
    evaluator: BoundedEvaluator,
    max_body_size: usize,
}

impl Transformer {
    pub fn new(evaluator: BoundedEvaluator, max_body_size: usize) -> Self {
        Self {
            evaluator,
            max_body_size,
        }
    }

    /// Rewrite `response` with `query`, if there is one.
    pub async fn modify_response(
        &self,
        query: Option<&RawQuery>,
        response: Response<Body>,
    ) -> ProxyResult<Response<Body>> {
        let Some(query) = query else {
            return Ok(response);
        };
        if !response.status().is_success() {
            return Ok(response);
        }

        match self.rewrite_response(query, response).await {
            Ok(rewritten) => {
                tracing::info!("Rewriting succeeded");
                Ok(rewritten)
            }
            Err(err) => {
                tracing::error!(code = %err.code, error = %err.message, "Rewriting failed");
                Err(err)
            }
        }
    }

    async fn rewrite_response(
        &self,
        query: &RawQuery,
        response: Response<Body>,
    ) -> ProxyResult<Response<Body>> {
        let (mut parts, body) = response.into_parts();

        if !has_media_type(&parts.headers, &header::CONTENT_TYPE, APPLICATION_JSON) {
            let received = parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("<none>");
            return Err(ProxyError::illegal_response_type(format!(
                "Expected {} response, got {}",
                APPLICATION_JSON, received
            )));
        }

        let bytes = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| {
                ProxyError::invalid_response_body(format!("Failed to read body: {}", e))
            })?;

        let root = decode_single_root(&bytes)?;
        let fallback = root.shape.empty_body();
        let results = self
            .evaluator
            .evaluate(query.as_str(), root.into_value())
            .await?;
        let rewritten = rewrite(&results, fallback)?;

        parts.status = rewritten.status;
        parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.content_length()));
        Ok(Response::from_parts(parts, Body::from(rewritten.body)))
    }
}
