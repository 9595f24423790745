//! MCP (Model Context Protocol) endpoint: a JSON-RPC 2.0 surface served at
//! `POST /mcp`, one message per request body, one JSON response per message.
//! Notifications are acknowledged with `202 Accepted`; no SSE stream is
//! offered, so `GET /mcp` answers `405 Method Not Allowed`.

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::McpState;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;

use crate::application::error::ErrorReport;

use models::{IncomingMessage, RpcError, RpcResponse};

pub fn build_mcp_router(state: McpState) -> Router {
    Router::new()
        .route("/mcp", post(handle_message))
        .with_state(state)
}

async fn handle_message(State(state): State<McpState>, body: Bytes) -> Response {
    let message: IncomingMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(err) => {
            return failure_response(
                Value::Null,
                RpcError::parse_error(),
                format!("unparseable JSON-RPC message: {err}"),
            );
        }
    };

    // Notifications carry no id and expect no response body.
    let Some(id) = message.id else {
        return StatusCode::ACCEPTED.into_response();
    };

    let Some(method) = message.method else {
        return failure_response(
            id,
            RpcError::invalid_request("request is missing a method"),
            "JSON-RPC request without a method",
        );
    };

    match method.as_str() {
        "initialize" => success_response(id, handlers::handle_initialize()),
        "tools/list" => success_response(id, handlers::handle_tools_list()),
        "tools/call" => match handlers::handle_tools_call(&state, message.params).await {
            Ok(result) => success_response(id, result),
            Err(error) => {
                let detail = error.message.clone();
                failure_response(id, error, detail)
            }
        },
        other => {
            let detail = format!("unsupported JSON-RPC method `{other}`");
            failure_response(id, RpcError::method_not_found(other), detail)
        }
    }
}

fn success_response(id: Value, result: Value) -> Response {
    Json(RpcResponse::success(id, result)).into_response()
}

/// Protocol faults ride on a 200 response with a JSON-RPC error object; the
/// attached report lets the logging middleware surface them anyway.
fn failure_response(id: Value, error: RpcError, detail: impl Into<String>) -> Response {
    let mut response = Json(RpcResponse::failure(id, error)).into_response();
    ErrorReport::from_message("infra::http::mcp", StatusCode::OK, detail).attach(&mut response);
    response
}
