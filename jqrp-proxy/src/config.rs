//! Proxy Configuration Module
//!
//! Configuration is read once at startup from environment variables.
//! Durations are given in milliseconds; zero means "not set". Values that
//! fail to parse fall back to their defaults.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ProxyError, ProxyResult};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8989;

/// Default compiled-query cache capacity.
pub const DEFAULT_CACHE_SIZE: i64 = 512;

/// Default upper bound on a buffered upstream body (16 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// PROXY CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    // ========================================================================
    // Listener
    // ========================================================================
    pub port: u16,

    /// Listen address, without the port.
    pub bind: String,

    /// Time allowed for reading a frontend request.
    pub read_timeout: Duration,

    /// Time allowed for producing and writing the response.
    pub write_timeout: Duration,

    // ========================================================================
    // Query pipeline
    // ========================================================================
    /// Compiled-query cache capacity. Zero or negative disables caching.
    pub cache_size: i64,

    /// Query evaluation deadline.
    pub eval_timeout: Duration,

    /// Largest upstream body buffered for transformation.
    pub max_body_size: usize,

    // ========================================================================
    // Upstream transport
    // ========================================================================
    pub dial_timeout: Duration,
    pub dial_keepalive: Duration,

    /// Upper bound on one upstream exchange.
    pub response_header_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            cache_size: DEFAULT_CACHE_SIZE,
            eval_timeout: Duration::ZERO,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            dial_timeout: Duration::ZERO,
            dial_keepalive: Duration::ZERO,
            response_header_timeout: Duration::ZERO,
        }
    }
}

impl ProxyConfig {
    /// Create ProxyConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: listen port (default: 8989)
    /// - `JQRP_BIND`: listen address (default: 0.0.0.0)
    /// - `CACHE_SIZE`: compiled-query cache capacity, <= 0 disables (default: 512)
    /// - `EVAL_TIMEOUT`: query evaluation deadline in ms (default: 0, none)
    /// - `READ_TIMEOUT`: frontend request read allowance in ms (default: 0, none)
    /// - `WRITE_TIMEOUT`: frontend response allowance in ms (default: 0, none)
    /// - `DIAL_TIMEOUT`: upstream connect timeout in ms (default: 0, none)
    /// - `DIAL_KEEPALIVE`: upstream TCP keep-alive in ms (default: 0, none)
    /// - `RESPONSE_HEADER_TIMEOUT`: upstream exchange deadline in ms (default: 0, none)
    /// - `MAX_BODY_SIZE`: largest transformable upstream body in bytes (default: 16 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let bind = std::env::var("JQRP_BIND")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.bind);

        let cache_size = std::env::var("CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cache_size);

        let max_body_size = std::env::var("MAX_BODY_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_body_size);

        Self {
            port,
            bind,
            read_timeout: millis_from_env("READ_TIMEOUT"),
            write_timeout: millis_from_env("WRITE_TIMEOUT"),
            cache_size,
            eval_timeout: millis_from_env("EVAL_TIMEOUT"),
            max_body_size,
            dial_timeout: millis_from_env("DIAL_TIMEOUT"),
            dial_keepalive: millis_from_env("DIAL_KEEPALIVE"),
            response_header_timeout: millis_from_env("RESPONSE_HEADER_TIMEOUT"),
        }
    }

    /// Cache capacity as an entry count; zero when caching is disabled.
    pub fn cache_capacity(&self) -> usize {
        usize::try_from(self.cache_size).unwrap_or(0)
    }

    pub fn eval_deadline(&self) -> Option<Duration> {
        non_zero(self.eval_timeout)
    }

    /// Deadline for one whole frontend exchange: the read allowance plus
    /// the write allowance.
    pub fn request_timeout(&self) -> Option<Duration> {
        non_zero(self.read_timeout.saturating_add(self.write_timeout))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero(self.dial_timeout)
    }

    pub fn tcp_keepalive(&self) -> Option<Duration> {
        non_zero(self.dial_keepalive)
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        non_zero(self.response_header_timeout)
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ProxyResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ProxyError::internal_error(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Log every effective value once at startup.
    pub fn log_summary(&self) {
        tracing::info!(port = self.port, bind = %self.bind, "Listener");
        tracing::info!(
            cache_size = self.cache_size,
            caching = self.cache_capacity() > 0,
            "Query cache"
        );
        tracing::info!(
            eval_timeout_ms = self.eval_timeout.as_millis() as u64,
            max_body_size = self.max_body_size,
            "Query evaluation"
        );
        tracing::info!(
            read_timeout_ms = self.read_timeout.as_millis() as u64,
            write_timeout_ms = self.write_timeout.as_millis() as u64,
            dial_timeout_ms = self.dial_timeout.as_millis() as u64,
            dial_keepalive_ms = self.dial_keepalive.as_millis() as u64,
            response_header_timeout_ms = self.response_header_timeout.as_millis() as u64,
            "Timeouts"
        );
    }
}

fn millis_from_env(key: &str) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
