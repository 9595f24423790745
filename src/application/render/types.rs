use std::io;

use thiserror::Error;

use crate::domain::diagram::{RenderPayload, RenderRequest};

/// Failures surfaced by the render gateway. Every failure is scoped to one
/// request; nothing is retried and nothing is swallowed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("mermaid CLI unavailable: {hint}")]
    Unavailable { hint: String },
    #[error("mermaid CLI invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("failed to stage render workspace: {0}")]
    Io(io::Error),
    #[error("failed to read rendered output: {0}")]
    Read(io::Error),
}

/// Seam between the tool surface and the rendering pipeline; lets the HTTP
/// layer be tested against a stub implementation.
pub trait RenderService: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<RenderPayload, RenderError>;
}
