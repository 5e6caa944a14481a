/// Tool Error Types
///
/// Errors a tool handler can surface to the host. The host does not retry;
/// it translates these into MCP error responses for the client.

use thiserror::Error;

/// Failure modes of a tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// An argument was missing or could not be interpreted as the declared type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The result does not fit the tool's fixed-width integer type.
    #[error("integer overflow: {0}")]
    Overflow(String),
}

impl ToolError {
    /// Build an InvalidArgument error for a parameter that is absent or has
    /// the wrong type.
    pub fn invalid_argument(param: &str, got: &serde_json::Value) -> Self {
        let got = match got {
            serde_json::Value::Null => "missing".to_string(),
            other => format!("got {other}"),
        };
        ToolError::InvalidArgument(format!("parameter '{param}' must be an integer ({got})"))
    }
}
