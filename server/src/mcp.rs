//! JSON-RPC 2.0 tool protocol shared by the stdio and HTTP transports.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::tools::{call_tool, tool_definitions, SERVER_INSTRUCTIONS};
use crate::AppState;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "music-mcp";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications, which get no response.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn reply(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: "2.0",
            id,
            result,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Handle one raw frame. Returns `None` for notifications.
pub async fn handle_message(state: &AppState, raw: &str) -> Option<RpcResponse> {
    let request: RpcRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => {
            warn!("Unparsable JSON-RPC frame: {e}");
            return Some(RpcResponse::reply(
                Value::Null,
                Err(RpcError::new(PARSE_ERROR, format!("Parse error: {e}"))),
            ));
        }
    };
    handle_request(state, request).await
}

pub async fn handle_request(state: &AppState, request: RpcRequest) -> Option<RpcResponse> {
    if request.jsonrpc.as_deref() != Some("2.0") {
        return Some(RpcResponse::reply(
            request.id.unwrap_or(Value::Null),
            Err(RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\"")),
        ));
    }

    debug!("JSON-RPC method {}", request.method);
    let outcome = dispatch(state, &request.method, request.params).await;
    match request.id {
        Some(id) => Some(RpcResponse::reply(id, outcome)),
        None => None,
    }
}

async fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
            "instructions": SERVER_INSTRUCTIONS,
        })),
        "notifications/initialized" | "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tool_definitions() })),
        "tools/call" => {
            let params: CallParams = serde_json::from_value(params)
                .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))?;
            match call_tool(state, &params.name, params.arguments).await {
                Ok(output) => Ok(tool_result(&output.text, output.is_error)),
                Err(e) if e.is_client_error() => Err(RpcError::new(INVALID_PARAMS, e.to_string())),
                // Tool failures are results, not protocol errors
                Err(e) => Ok(tool_result(&error_text(&e), true)),
            }
        }
        other => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        )),
    }
}

fn tool_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [ { "type": "text", "text": text } ],
        "isError": is_error,
    })
}

fn error_text(e: &ApiError) -> String {
    format!("Error: {e}")
}

/// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
pub async fn serve_stdio(state: AppState) -> anyhow::Result<()> {
    info!("Serving tools over stdio");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_message(&state, &line).await {
            let mut frame = serde_json::to_vec(&response)?;
            frame.push(b'\n');
            stdout.write_all(&frame).await?;
            stdout.flush().await?;
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_omits_unused_member() {
        let ok = serde_json::to_value(RpcResponse::reply(json!(1), Ok(json!({})))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));

        let err = serde_json::to_value(RpcResponse::reply(
            json!("a"),
            Err(RpcError::new(METHOD_NOT_FOUND, "Method not found: x")),
        ))
        .unwrap();
        assert_eq!(err["error"]["code"], -32601);
        assert!(err.get("result").is_none());
    }

    #[test]
    fn test_request_without_id_is_notification() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(request.id.is_none());
        assert!(request.params.is_null());
    }

    #[test]
    fn test_tool_result_shape() {
        let result = tool_result("hello", false);
        assert_eq!(result["content"][0], json!({"type": "text", "text": "hello"}));
        assert_eq!(result["isError"], false);
    }
}
