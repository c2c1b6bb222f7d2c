//! Error types for the export pipeline
//!
//! Per-item problems (one image, one formula, one font) never surface as these
//! errors; they are logged and recorded in the export report. What remains here is
//! what a caller can act on.

use thiserror::Error;

use crate::clipboard::ClipboardError;

/// Result type alias for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Error types for a whole export
#[derive(Debug, Error)]
pub enum ExportError {
    /// The preview handed to the pipeline has no content section
    ///
    /// Upstream rendering did not produce the documented input shape.
    #[error("Preview has no `section.{0}` content container")]
    MissingContentSection(&'static str),

    /// The preview HTML has no root element
    #[error("Preview HTML has no root element")]
    EmptyPreview,

    /// Every clipboard tier failed
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// DOM serialization failed
    #[error("Failed to serialize export HTML: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ExportError {
    fn from(error: anyhow::Error) -> Self {
        ExportError::Other(format!("{error:#}"))
    }
}

impl ExportError {
    /// Contract violations abort immediately and get their own notification
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ExportError::MissingContentSection(_) | ExportError::EmptyPreview
        )
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Formula conversion errors
#[derive(Debug, Error)]
pub enum FormulaError {
    /// The renderer rejected the source
    #[error("Formula renderer failed: {0}")]
    Render(String),

    /// Source longer than the configured bound
    #[error("Formula source too long: {len} characters (max: {max})")]
    SourceTooLong { len: usize, max: usize },

    /// The renderer did not answer in time
    #[error("Formula renderer timed out after {0} ms")]
    Timeout(u64),

    /// The renderer answered with something that is not SVG
    #[error("Renderer output has no <svg> root")]
    NotVector,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for FormulaError {
    fn from(error: anyhow::Error) -> Self {
        FormulaError::Render(format!("{error:#}"))
    }
}

/// Rasterization errors
///
/// These stay inside the raster module: `rasterize` always returns something
/// displayable and only reports which fallback it used.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The vector markup could not be parsed
    #[error("SVG could not be loaded: {0}")]
    Load(String),

    /// The markup uses content the raster backend cannot draw faithfully
    #[error("SVG contains content that cannot be rasterized: {0}")]
    Tainted(&'static str),

    #[error("Invalid raster size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}
