/// MCP Server Entry Point
///
/// Reads transport mode and server metadata from environment variables, then
/// starts the matching server implementation.
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "mcp-add-server")
/// - SERVER_VERSION: Version string (default: "0.1.0")
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "both")
/// - HOST: Bind address for HTTP mode (default: "0.0.0.0")
/// - PORT: Port number for HTTP mode (default: 3000)
/// - RUST_LOG: tracing filter (default: "info")

mod core;
mod tools;

use crate::core::server;
use crate::core::utils::get_env_var;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Diagnostics go to stderr; stdout is reserved for the JSON-RPC stream
    // in STDIO mode.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let name = get_env_var("SERVER_NAME", "mcp-add-server");
    let version = get_env_var("SERVER_VERSION", env!("CARGO_PKG_VERSION"));
    let transport = get_env_var("MCP_TRANSPORT_MODE", "both");

    match transport.as_str() {
        "stdio" => {
            // STDIO only: MCP Inspector and local development
            server::run_server_stdio(name, version).await
        }
        "http" => {
            let (host, port) = http_bind_config();
            server::run_server_http(name, version, host, port).await
        }
        "both" => {
            // STDIO in a background task, HTTP in the foreground
            let (host, port) = http_bind_config();
            let name_clone = name.clone();
            let version_clone = version.clone();

            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(name_clone, version_clone).await {
                    error!(error = %e, "STDIO server error");
                }
            });

            let http_result = server::run_server_http(name, version, host, port).await;

            // HTTP server exited; stop the STDIO task too
            stdio_handle.abort();

            http_result
        }
        other => {
            error!(transport = other, "invalid transport mode, must be 'stdio', 'http', or 'both'");
            std::process::exit(1);
        }
    }
}

fn http_bind_config() -> (String, u16) {
    let host = get_env_var("HOST", "0.0.0.0");
    let port = get_env_var("PORT", "3000").parse::<u16>().unwrap_or(3000);
    (host, port)
}
