use std::{ffi::OsString, fs, io::ErrorKind, path::Path, sync::Arc, time::Instant};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::config::RenderSettings;
use crate::domain::diagram::{OutputFormat, RenderPayload, RenderRequest};

use super::resolver::{self, INSTALL_HINT, ResolverConfig};
use super::runner::{ProcessRunner, SystemProcessRunner};
use super::types::{RenderError, RenderService};
use super::workspace::RenderWorkspace;

/// The render gateway: resolves the external mermaid CLI, stages input and
/// output through a per-call temp workspace, invokes the CLI as a blocking
/// subprocess, and packages the produced file.
///
/// The gateway holds no mutable state; concurrent renders share nothing but
/// the filesystem namespace, which the per-call workspace keeps disjoint.
pub struct RenderGateway {
    resolver_config: ResolverConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl RenderGateway {
    pub fn new(settings: &RenderSettings) -> Self {
        Self::with_runner(settings, Arc::new(SystemProcessRunner))
    }

    pub fn with_runner(settings: &RenderSettings, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            resolver_config: ResolverConfig {
                cli_path: settings.mermaid_cli_path.clone(),
                local_bin_dir: settings.local_bin_dir.clone(),
            },
            runner,
        }
    }
}

impl RenderService for RenderGateway {
    fn render(&self, request: &RenderRequest) -> Result<RenderPayload, RenderError> {
        let started_at = Instant::now();
        let format = request.output_format;

        let renderer = match resolver::resolve(&self.resolver_config) {
            Some(renderer) => renderer,
            None => {
                warn!(
                    target = "application::render",
                    op = "gateway::render",
                    result = "error",
                    error_code = "unavailable",
                    "no mermaid CLI resolved"
                );
                observe(format, "unavailable");
                return Err(RenderError::Unavailable {
                    hint: INSTALL_HINT.to_string(),
                });
            }
        };

        let workspace = RenderWorkspace::stage(&request.diagram, format).map_err(|err| {
            observe(format, "io");
            RenderError::Io(err)
        })?;

        let mut args: Vec<OsString> = renderer.prefix_args.clone();
        args.extend([
            OsString::from("--input"),
            workspace.input_path().into(),
            OsString::from("--output"),
            workspace.output_path().into(),
            OsString::from("--outputFormat"),
            OsString::from(format.as_str()),
            OsString::from("--theme"),
            OsString::from(request.theme()),
            OsString::from("--quiet"),
        ]);

        let cli_started_at = Instant::now();
        let output = self.runner.run(&renderer.program, &args).map_err(|err| {
            warn!(
                target = "application::render",
                op = "gateway::render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "spawn_cli",
                program = %renderer.program.display(),
                error = %err,
                "failed to spawn mermaid CLI"
            );
            if err.kind() == ErrorKind::NotFound {
                observe(format, "unavailable");
                RenderError::Unavailable {
                    hint: INSTALL_HINT.to_string(),
                }
            } else {
                observe(format, "io");
                RenderError::Io(err)
            }
        })?;

        let cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64;

        if !output.success {
            let exit_code = output.exit_code;
            let stderr = output.stderr_lossy();
            warn!(
                target = "application::render",
                op = "gateway::render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                cli_elapsed_ms = cli_elapsed_ms,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "mermaid_cli",
                stderr = %stderr,
                "mermaid CLI invocation failed"
            );
            observe(format, "cli");
            return Err(RenderError::Cli { exit_code, stderr });
        }

        let content = read_content(workspace.output_path(), format).map_err(|err| {
            observe(format, "read");
            err
        })?;

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        info!(
            target = "application::render",
            op = "gateway::render",
            result = "ok",
            format = format.as_str(),
            elapsed_ms = elapsed_ms,
            cli_elapsed_ms = cli_elapsed_ms,
            content_bytes = content.len(),
            "diagram rendered"
        );
        observe(format, "ok");
        histogram!("disegno_render_duration_ms").record(elapsed_ms as f64);
        histogram!("disegno_render_cli_duration_ms").record(cli_elapsed_ms as f64);

        Ok(RenderPayload {
            format,
            mime: format.mime(),
            content,
        })
    }
}

/// Read the renderer's output file: verbatim UTF-8 for text formats, base64
/// of the exact bytes for binary formats.
fn read_content(path: &Path, format: OutputFormat) -> Result<String, RenderError> {
    if format.is_text() {
        fs::read_to_string(path).map_err(RenderError::Read)
    } else {
        let bytes = fs::read(path).map_err(RenderError::Read)?;
        Ok(STANDARD.encode(bytes))
    }
}

fn observe(format: OutputFormat, result: &'static str) {
    counter!(
        "disegno_render_total",
        "format" => format.as_str(),
        "result" => result
    )
    .increment(1);
}
