//! Transient render entities. Nothing here is persisted; both types live
//! for the duration of a single request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Theme forwarded to the renderer when a request does not name one.
pub const DEFAULT_THEME: &str = "default";

/// Output formats the external renderer can produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
    Pdf,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// File extension handed to the renderer; mmdc derives the produced
    /// format from the output file suffix.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Png => "image/png",
            OutputFormat::Pdf => "application/pdf",
        }
    }

    /// Text formats are returned verbatim; binary formats are base64-encoded.
    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Svg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "svg" => Ok(OutputFormat::Svg),
            "png" => Ok(OutputFormat::Png),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(format!(
                "unknown output format `{other}`, expected one of svg, png, pdf"
            )),
        }
    }
}

/// One render request. Requests are independent and stateless; there are no
/// cross-request invariants.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    pub diagram: String,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub theme: Option<String>,
}

impl RenderRequest {
    pub fn new(diagram: impl Into<String>, output_format: OutputFormat) -> Self {
        Self {
            diagram: diagram.into(),
            output_format,
            theme: None,
        }
    }

    /// Theme handed to the renderer. Passed through uncontrolled; an unknown
    /// theme surfaces as a CLI failure from the renderer itself.
    pub fn theme(&self) -> &str {
        self.theme.as_deref().unwrap_or(DEFAULT_THEME)
    }
}

/// Rendered output returned to the caller. Invariant: `content` encoding
/// matches `format` — raw UTF-8 markup for svg, standard base64 of the exact
/// renderer bytes for png and pdf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPayload {
    pub format: OutputFormat,
    pub mime: &'static str,
    pub content: String,
}
