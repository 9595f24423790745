use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

use crate::domain::diagram::OutputFormat;

const INPUT_FILE: &str = "input.mmd";

/// Exclusive scratch directory for a single render call. Input and output
/// stay confined to it, and the directory is removed when the workspace
/// drops, on success and failure alike.
#[derive(Debug)]
pub struct RenderWorkspace {
    dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl RenderWorkspace {
    /// Create the workspace and write the diagram source verbatim as UTF-8
    /// to `input.mmd` within it.
    pub fn stage(source: &str, format: OutputFormat) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("disegno-render-").tempdir()?;
        let input_path = dir.path().join(INPUT_FILE);
        fs::write(&input_path, source.as_bytes())?;
        let output_path = dir.path().join(format!("out.{}", format.extension()));
        Ok(Self {
            dir,
            input_path,
            output_path,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}
