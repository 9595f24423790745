use std::sync::Arc;

use crate::application::render::RenderService;

/// Shared state for the MCP endpoint. The render service is the only
/// dependency; in-flight requests share nothing else.
#[derive(Clone)]
pub struct McpState {
    pub render: Arc<dyn RenderService>,
}
