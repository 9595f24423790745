//! The render gateway and its seams: executable resolution, subprocess
//! invocation, and scoped temp-directory staging.

mod gateway;
mod resolver;
mod runner;
mod types;
mod workspace;

pub use gateway::RenderGateway;
pub use runner::{ProcessOutput, ProcessRunner, SystemProcessRunner};
pub use types::{RenderError, RenderService};
