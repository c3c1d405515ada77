//! jqrp: a reverse proxy that rewrites JSON responses with jq
//!
//! Clients opt in per request by sending `Accept: application/json` and a
//! `JQ` header. The upstream JSON body is then replaced by the query's
//! result, or the request fails with a status describing why.

pub mod config;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod telemetry;
pub mod transformer;

pub use config::ProxyConfig;
pub use error::{ErrorCode, ProxyError, ProxyResult};
pub use middleware::{query_header_middleware, RawQuery};
pub use proxy::ReverseProxy;
pub use router::{build_proxy, create_router};
pub use transformer::Transformer;
