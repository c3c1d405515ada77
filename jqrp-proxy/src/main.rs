//! jqrp entry point
//!
//! Parses the backend URL, loads configuration from the environment and
//! serves the proxy until Ctrl-C.

use std::net::SocketAddr;

use clap::Parser;
use jqrp_proxy::telemetry::init_tracing;
use jqrp_proxy::{build_proxy, create_router, ProxyConfig, ProxyError, ProxyResult};
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "jqrp", version, about = "Reverse proxy that rewrites JSON responses with jq")]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8080
    #[arg(value_name = "BACKEND")]
    backend: Url,
}

#[tokio::main]
async fn main() -> ProxyResult<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = ProxyConfig::from_env();
    config.log_summary();

    let proxy = build_proxy(cli.backend, &config)?;
    tracing::info!(backend = %proxy.backend(), "Backend");
    let app = create_router(proxy, &config);

    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting jqrp");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ProxyError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result.map_err(|e| ProxyError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
