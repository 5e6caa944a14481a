/// MCP Server Implementation
///
/// JSON-RPC 2.0 request/response structures, the tool registry, the protocol
/// method handlers shared by both transports, and the HTTP (Actix Web) and
/// STDIO server loops.

use actix_web::{
    web, App, HttpServer, HttpResponse, Result,
    middleware::{Compress, Logger, DefaultHeaders},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::error::ToolError;
use crate::tools;

/// Server metadata reported in MCP initialize responses. Cloned into every
/// HTTP worker thread.
#[derive(Clone)]
pub struct AppState {
    pub server_name: String,
    pub server_version: String,
}

/// JSON-RPC 2.0 request. `id` is None for notifications.
#[derive(Deserialize, Debug)]
pub struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<serde_json::Value>,
    /// MCP method name ("initialize", "tools/list", "tools/call")
    method: String,
    params: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response. Exactly one of `result` and `error` is present.
#[derive(Serialize, Debug)]
pub struct McpResponse {
    jsonrpc: String,
    id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

impl McpResponse {
    fn ok(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(McpError { code, message, data: None }),
        }
    }

    #[cfg(test)]
    pub fn result(&self) -> Option<&serde_json::Value> {
        self.result.as_ref()
    }

    #[cfg(test)]
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Debug)]
pub struct McpError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

/// Descriptor of a registered tool, serialized for tools/list.
#[derive(Serialize, Debug, Clone)]
pub struct ToolSpec {
    /// Stable tool identifier (e.g., "add")
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// A tool invocation callable. Handlers are stateless pure functions; they
/// must be Send + Sync because HTTP workers may call them in parallel.
pub type ToolHandler =
    Box<dyn Fn(&serde_json::Value) -> std::result::Result<serde_json::Value, ToolError> + Send + Sync>;

/// Registry of available tools: descriptors for discovery, handlers keyed by
/// name for dispatch.
pub struct ToolRegistry {
    pub tools: Vec<ToolSpec>,
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Add a tool descriptor and its handler. Called by each tool module's
    /// `register` function during startup.
    pub fn register(&mut self, tool: ToolSpec, handler: ToolHandler) {
        let name = tool.name.clone();
        self.tools.push(tool);
        self.handlers.insert(name, handler);
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the registry with every tool this server ships.
pub fn initialize_tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    tools::add::register(&mut registry);
    Arc::new(registry)
}

/// Route one JSON-RPC request to the matching MCP method handler.
///
/// Shared by both transports; the HTTP handler and the STDIO loop only differ
/// in how they frame requests and responses.
pub fn dispatch(state: &AppState, registry: &ToolRegistry, req: &McpRequest) -> McpResponse {
    match req.method.as_str() {
        "initialize" => handle_initialize(state, req.id.clone()),
        "tools/list" => handle_tools_list(registry, req.id.clone()),
        "tools/call" => handle_tools_call(registry, req.id.clone(), req.params.as_ref()),
        other => McpResponse::err(req.id.clone(), -32601, format!("Method not found: {other}")),
    }
}

/// MCP initialize: protocol version, capabilities, and server identity.
fn handle_initialize(state: &AppState, id: Option<serde_json::Value>) -> McpResponse {
    McpResponse::ok(
        id,
        serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": state.server_name,
                "version": state.server_version
            }
        }),
    )
}

/// MCP tools/list: descriptors of every registered tool.
fn handle_tools_list(registry: &ToolRegistry, id: Option<serde_json::Value>) -> McpResponse {
    McpResponse::ok(id, serde_json::json!({ "tools": registry.tools }))
}

/// MCP tools/call: look up the named tool and execute it.
///
/// Handler failures (invalid arguments, overflow) are reported as MCP content
/// results with `isError: true`; an unknown tool name is a protocol-level
/// -32601 error.
fn handle_tools_call(
    registry: &ToolRegistry,
    id: Option<serde_json::Value>,
    params: Option<&serde_json::Value>,
) -> McpResponse {
    let Some(tool_params) = params else {
        return McpResponse::err(id, -32602, "Invalid params".to_string());
    };

    let tool_name = tool_params.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let arguments = tool_params
        .get("arguments")
        .cloned()
        .unwrap_or(serde_json::json!({}));

    let Some(handler) = registry.handlers.get(tool_name) else {
        warn!(tool = tool_name, "tools/call for unregistered tool");
        return McpResponse::err(id, -32601, format!("Unknown tool: {tool_name}"));
    };

    match handler(&arguments) {
        Ok(result) => McpResponse::ok(
            id,
            serde_json::json!({
                "content": [
                    {
                        "type": "text",
                        "text": serde_json::to_string(&result).unwrap_or_default()
                    }
                ],
                "isError": false
            }),
        ),
        Err(e) => {
            debug!(tool = tool_name, error = %e, "tool invocation failed");
            McpResponse::ok(
                id,
                serde_json::json!({
                    "content": [
                        {
                            "type": "text",
                            "text": format!("Error: {e}")
                        }
                    ],
                    "isError": true
                }),
            )
        }
    }
}

/// Health check endpoint for load balancers and monitoring.
async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "mcp-add-server"
    })))
}

/// Total requests processed since server start.
async fn metrics_handler(
    counter: web::Data<std::sync::atomic::AtomicU64>,
) -> Result<HttpResponse> {
    let count = counter.load(std::sync::atomic::Ordering::Relaxed);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "requests_total": count,
        "status": "ok"
    })))
}

/// Main MCP entry point in HTTP mode.
async fn mcp_handler(
    state: web::Data<AppState>,
    registry: web::Data<Arc<ToolRegistry>>,
    counter: web::Data<std::sync::atomic::AtomicU64>,
    req: web::Json<McpRequest>,
) -> Result<HttpResponse> {
    // Relaxed is enough: the counter only needs atomicity, not ordering.
    counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let response = dispatch(&state, &registry, &req);
    Ok(HttpResponse::Ok().json(response))
}

/// Server-Sent Events endpoint streaming the current tool list, so clients
/// can discover tools without speaking JSON-RPC.
async fn sse_tools_discovery(
    registry: web::Data<Arc<ToolRegistry>>,
) -> Result<HttpResponse> {
    use actix_web::http::header;

    let tools_data = serde_json::json!({
        "tools": registry.tools,
        "count": registry.tools.len()
    });

    // SSE framing: "data: {json}\n\n"
    let sse_data = format!(
        "data: {}\n\n",
        serde_json::to_string(&tools_data).unwrap_or_else(|_| "{}".to_string())
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        // Disable nginx buffering so events stream through
        .insert_header(("x-accel-buffering", "no"))
        .body(sse_data))
}

/// Run the MCP server over HTTP with Actix Web.
///
/// Worker count defaults to the CPU count capped at 16, overridable via
/// WORKER_THREADS. Connection limits and timeouts match a production posture.
pub async fn run_server_http(name: String, version: String, host: String, port: u16) -> std::io::Result<()> {
    use std::time::Duration;
    use std::sync::atomic::AtomicU64;

    let bind_addr = format!("{host}:{port}");

    let app_state = web::Data::new(AppState {
        server_name: name.clone(),
        server_version: version.clone(),
    });
    let tool_registry = web::Data::new(initialize_tools());
    let request_count = web::Data::new(AtomicU64::new(0));

    let workers = std::env::var("WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| num_cpus::get().clamp(1, 16));

    info!(%name, %version, %bind_addr, workers, "MCP server starting (HTTP mode)");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(tool_registry.clone())
            .app_data(request_count.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .wrap(Logger::new("%r %s %Dms"))
            .route("/health", web::get().to(health))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/sse", web::get().to(sse_tools_discovery))
            .route("/mcp", web::post().to(mcp_handler))
            .route("/", web::post().to(mcp_handler))
            .route("/", web::get().to(health))
    })
    .workers(workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server over STDIO for MCP Inspector and local development.
///
/// Reads line-delimited JSON-RPC from stdin, writes responses to stdout, one
/// request at a time. All diagnostics go to stderr via tracing so the stdout
/// protocol stream stays clean.
pub async fn run_server_stdio(name: String, version: String) -> std::io::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

    info!(%name, %version, "MCP server starting (STDIO mode)");

    let tool_registry = initialize_tools();
    let app_state = AppState {
        server_name: name,
        server_version: version,
    };

    let stdin = tokio::io::stdin();
    let mut stdin = BufReader::with_capacity(8192, stdin).lines();
    let stdout = tokio::io::stdout();
    let mut stdout = BufWriter::with_capacity(8192, stdout);

    while let Some(line) = stdin.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<McpRequest>(&line) {
            Ok(req) => {
                // Notifications carry no id and get no response.
                if req.id.is_none() {
                    if req.method == "notifications/initialized" {
                        debug!("client initialization complete");
                    }
                    continue;
                }
                dispatch(&app_state, &tool_registry, &req)
            }
            Err(e) => {
                warn!(error = %e, "malformed JSON-RPC request");
                // Only answer if the line carries an id we can echo back.
                let Some(id) = serde_json::from_str::<serde_json::Value>(&line)
                    .ok()
                    .and_then(|v| v.get("id").cloned())
                else {
                    continue;
                };
                McpResponse::err(Some(id), -32700, format!("Parse error: {e}"))
            }
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                continue;
            }
        };

        // One response per line, flushed immediately for low latency.
        if let Err(e) = stdout.write_all(response_json.as_bytes()).await {
            error!(error = %e, "failed to write to stdout");
            break;
        }
        if let Err(e) = stdout.write_all(b"\n").await {
            error!(error = %e, "failed to write to stdout");
            break;
        }
        if let Err(e) = stdout.flush().await {
            error!(error = %e, "failed to flush stdout");
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState {
            server_name: "mcp-add-server".to_string(),
            server_version: "0.1.0".to_string(),
        }
    }

    fn request(method: &str, params: Option<serde_json::Value>) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn initialize_reports_server_info() {
        let registry = initialize_tools();
        let resp = dispatch(&test_state(), &registry, &request("initialize", None));
        let result = resp.result().expect("initialize should succeed");
        assert_eq!(result["serverInfo"]["name"], "mcp-add-server");
        assert_eq!(result["protocolVersion"], "2024-11-05");
    }

    #[test]
    fn tools_list_includes_add() {
        let registry = initialize_tools();
        let resp = dispatch(&test_state(), &registry, &request("tools/list", None));
        let result = resp.result().expect("tools/list should succeed");
        let tools = result["tools"].as_array().expect("tools array");
        let add = tools
            .iter()
            .find(|t| t["name"] == "add")
            .expect("add tool registered");
        assert_eq!(add["description"], "Add two numbers");
        assert_eq!(add["inputSchema"]["required"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn tools_call_executes_add() {
        let registry = initialize_tools();
        let params = serde_json::json!({
            "name": "add",
            "arguments": { "a": 2, "b": 3 }
        });
        let resp = dispatch(&test_state(), &registry, &request("tools/call", Some(params)));
        let result = resp.result().expect("tools/call should succeed");
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        let payload: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["result"], 5);
    }

    #[test]
    fn tools_call_invalid_argument_is_tool_error() {
        let registry = initialize_tools();
        let params = serde_json::json!({
            "name": "add",
            "arguments": { "a": "x", "b": 3 }
        });
        let resp = dispatch(&test_state(), &registry, &request("tools/call", Some(params)));
        let result = resp.result().expect("handler errors are content results");
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("invalid argument"));
    }

    #[test]
    fn tools_call_unknown_tool_is_method_not_found() {
        let registry = initialize_tools();
        let params = serde_json::json!({ "name": "subtract", "arguments": {} });
        let resp = dispatch(&test_state(), &registry, &request("tools/call", Some(params)));
        assert_eq!(resp.error_code(), Some(-32601));
    }

    #[test]
    fn tools_call_without_params_is_invalid_params() {
        let registry = initialize_tools();
        let resp = dispatch(&test_state(), &registry, &request("tools/call", None));
        assert_eq!(resp.error_code(), Some(-32602));
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let registry = initialize_tools();
        let resp = dispatch(&test_state(), &registry, &request("resources/list", None));
        assert_eq!(resp.error_code(), Some(-32601));
    }
}
