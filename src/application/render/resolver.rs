//! Executable resolution for the mermaid CLI.
//!
//! Resolution is an ordered list of strategies, each a pure function of the
//! configuration and an environment snapshot; the first success wins. It is
//! performed per render call and never cached, so an operator can install
//! the CLI without restarting the service.

use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Binary name of the mermaid CLI.
const MERMAID_BINARY: &str = "mmdc";

/// npm package `npx` fetches when the CLI is not installed.
const NPX_PACKAGE: &str = "@mermaid-js/mermaid-cli";

/// Remediation text carried by `RenderError::Unavailable`.
pub(crate) const INSTALL_HINT: &str = "install mermaid-cli (`npm install -g @mermaid-js/mermaid-cli`) or point `render.mermaid_cli_path` at the executable";

/// A renderer invocation resolved from the environment: the program to spawn
/// plus any arguments that precede the renderer's own flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRenderer {
    pub program: PathBuf,
    pub prefix_args: Vec<OsString>,
}

impl ResolvedRenderer {
    fn direct(program: PathBuf) -> Self {
        Self {
            program,
            prefix_args: Vec::new(),
        }
    }
}

/// The subset of render settings the resolver consults.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Configured CLI location: a bare binary name searched on `PATH`, or a
    /// path checked directly.
    pub cli_path: PathBuf,
    /// Directory holding a project-local installation of the CLI.
    pub local_bin_dir: PathBuf,
}

/// Snapshot of the process environment consulted by the strategies.
#[derive(Debug, Clone)]
pub struct ResolverEnv {
    pub search_path: Option<OsString>,
}

impl ResolverEnv {
    pub fn from_process() -> Self {
        Self {
            search_path: env::var_os("PATH"),
        }
    }
}

type Strategy = fn(&ResolverConfig, &ResolverEnv) -> Option<ResolvedRenderer>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("configured", resolve_configured),
    ("local-install", resolve_local_install),
    ("npx", resolve_npx),
];

/// Resolve the mermaid CLI against the current process environment.
pub fn resolve(config: &ResolverConfig) -> Option<ResolvedRenderer> {
    resolve_in(config, &ResolverEnv::from_process())
}

pub(crate) fn resolve_in(config: &ResolverConfig, env: &ResolverEnv) -> Option<ResolvedRenderer> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let resolved = strategy(config, env)?;
        debug!(
            target = "application::render::resolver",
            strategy = *name,
            program = %resolved.program.display(),
            "resolved mermaid CLI"
        );
        Some(resolved)
    })
}

/// Strategy 1: the configured CLI path. A bare name is searched on `PATH`;
/// anything with a separator is checked as a filesystem path.
fn resolve_configured(config: &ResolverConfig, env: &ResolverEnv) -> Option<ResolvedRenderer> {
    let path = &config.cli_path;
    if path.components().count() > 1 {
        return is_executable(path).then(|| ResolvedRenderer::direct(path.clone()));
    }
    find_in_path_list(path, env.search_path.as_deref()).map(ResolvedRenderer::direct)
}

/// Strategy 2: a project-local installation under `local_bin_dir`, the
/// conventional `node_modules/.bin` location by default.
fn resolve_local_install(config: &ResolverConfig, _env: &ResolverEnv) -> Option<ResolvedRenderer> {
    let candidate = config.local_bin_dir.join(MERMAID_BINARY);
    is_executable(&candidate).then(|| ResolvedRenderer::direct(candidate))
}

/// Strategy 3: `npx` as an on-demand runner that fetches the CLI package.
fn resolve_npx(_config: &ResolverConfig, env: &ResolverEnv) -> Option<ResolvedRenderer> {
    let npx = find_in_path_list(Path::new("npx"), env.search_path.as_deref())?;
    Some(ResolvedRenderer {
        program: npx,
        prefix_args: vec![OsString::from("--yes"), OsString::from(NPX_PACKAGE)],
    })
}

fn find_in_path_list(name: &Path, search_path: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    let search_path = search_path?;
    env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}
