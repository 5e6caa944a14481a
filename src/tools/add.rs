/// Addition Tool
///
/// Adds two integers. Operands are i64; the sum uses checked arithmetic and
/// fails with an overflow error rather than wrapping.

use crate::core::error::ToolError;
use crate::core::server::{ToolHandler, ToolRegistry, ToolSpec};
use serde_json::Value;
use tracing::debug;

/// Register the add tool with the tool registry.
pub fn register(registry: &mut ToolRegistry) {
    let tool = ToolSpec {
        name: "add".to_string(),
        description: "Add two numbers".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "integer",
                    "description": "First operand"
                },
                "b": {
                    "type": "integer",
                    "description": "Second operand"
                }
            },
            "required": ["a", "b"]
        }),
    };

    let handler: ToolHandler = Box::new(|args: &Value| add(args));

    registry.register(tool, handler);
}

/// Execute one add invocation against the raw JSON arguments.
///
/// Logs a diagnostic record with both operands before computing the sum, so
/// the record is emitted even when the addition itself fails.
fn add(args: &Value) -> Result<Value, ToolError> {
    let a = integer_arg(args, "a")?;
    let b = integer_arg(args, "b")?;

    debug!(tool = "add", a, b, "add({a}, {b})");

    let sum = a
        .checked_add(b)
        .ok_or_else(|| ToolError::Overflow(format!("{a} + {b} does not fit in i64")))?;

    Ok(serde_json::json!({ "result": sum }))
}

/// Extract a required integer parameter.
///
/// Only JSON integers that fit i64 are accepted; floats, strings, booleans,
/// and missing values are invalid arguments.
fn integer_arg(args: &Value, param: &str) -> Result<i64, ToolError> {
    let value = args.get(param).unwrap_or(&Value::Null);
    value
        .as_i64()
        .ok_or_else(|| ToolError::invalid_argument(param, value))
}
