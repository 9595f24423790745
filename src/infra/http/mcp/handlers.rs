//! MCP method handlers: server initialization, the tool registry, and
//! `tools/call` dispatch into the render gateway.

use serde_json::{Value, json};

use crate::domain::diagram::{RenderPayload, RenderRequest};

use super::models::{RpcError, ToolCallParams};
use super::state::McpState;

/// MCP protocol revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported during initialization.
pub const SERVER_NAME: &str = "disegno";

/// Name of the single tool this server exposes.
pub const RENDER_TOOL_NAME: &str = "render_mermaid";

/// Handle the `initialize` request.
pub fn handle_initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn render_mermaid_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "diagram": {
                "type": "string",
                "description": "Mermaid source, e.g. 'graph TD; A-->B;'"
            },
            "output_format": {
                "type": "string",
                "enum": ["svg", "png", "pdf"],
                "default": "svg",
                "description": "Rendered output format"
            },
            "theme": {
                "type": "string",
                "default": "default",
                "description": "Theme forwarded to the mermaid CLI"
            }
        },
        "required": ["diagram"]
    })
}

fn render_mermaid_tool() -> Value {
    json!({
        "name": RENDER_TOOL_NAME,
        "description": "Render Mermaid diagram source to svg, png or pdf by invoking the mermaid CLI. Returns raw SVG markup for svg and base64-encoded bytes for png/pdf.",
        "inputSchema": render_mermaid_input_schema()
    })
}

/// Handle the `tools/list` request.
pub fn handle_tools_list() -> Value {
    json!({
        "tools": [render_mermaid_tool()]
    })
}

/// Handle the `tools/call` request. Malformed parameters are protocol
/// faults; render failures come back as tool results with `isError`.
pub async fn handle_tools_call(state: &McpState, params: Option<Value>) -> Result<Value, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("missing params for tools/call"))?;
    let call: ToolCallParams = serde_json::from_value(params)
        .map_err(|err| RpcError::invalid_params(format!("malformed tools/call params: {err}")))?;

    if call.name != RENDER_TOOL_NAME {
        return Ok(tool_error(format!("Unknown tool: {}", call.name)));
    }

    let arguments = call.arguments.unwrap_or_else(|| json!({}));
    let request: RenderRequest = serde_json::from_value(arguments).map_err(|err| {
        RpcError::invalid_params(format!("invalid {RENDER_TOOL_NAME} arguments: {err}"))
    })?;

    // The render call blocks on the external subprocess; keep it off the
    // async workers so it stalls only its own request.
    let render = state.render.clone();
    let outcome = tokio::task::spawn_blocking(move || render.render(&request)).await;

    match outcome {
        Ok(Ok(payload)) => Ok(tool_success(&payload)),
        Ok(Err(err)) => Ok(tool_error(err.to_string())),
        Err(join_err) => Ok(tool_error(format!("render task failed: {join_err}"))),
    }
}

fn tool_success(payload: &RenderPayload) -> Value {
    let structured = json!({
        "format": payload.format,
        "mime": payload.mime,
        "content": payload.content,
    });
    json!({
        "content": [{
            "type": "text",
            "text": structured.to_string()
        }],
        "structuredContent": structured
    })
}

/// Build a tool error result.
fn tool_error(message: impl Into<String>) -> Value {
    json!({
        "isError": true,
        "content": [{
            "type": "text",
            "text": message.into()
        }]
    })
}
