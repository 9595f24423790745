pub mod mcp;
pub mod middleware;

pub use mcp::{McpState, build_mcp_router};

use axum::{Router, http::StatusCode, middleware as axum_middleware, routing::get};

/// Assemble the full HTTP surface: the MCP endpoint plus a liveness probe.
pub fn build_router(state: McpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(build_mcp_router(state))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}
