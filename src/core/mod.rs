/// Core Server Framework Module
///
/// - server.rs: MCP server with HTTP and STDIO transports
/// - error.rs: tool error types
/// - utils.rs: environment helpers

pub mod error;
pub mod server;
pub mod utils;
