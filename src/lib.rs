pub mod clipboard;
pub mod config;
pub mod error;
pub mod formula;
pub mod inline_resources;
pub mod pipeline;
pub mod publishing;
pub mod raster;
pub mod sanitizer;
pub mod utils;

pub use clipboard::{
    ClipboardBackend, ClipboardError, ClipboardItem, ClipboardPayload, ClipboardWriter,
    SystemClipboard, TierKind, WriteOutcome,
};
pub use config::ExportConfig;
pub use error::{ExportError, ExportResult, FormulaError, RasterError};
pub use formula::{
    CommandRenderer, ConversionSummary, ExtractedFormula, FormulaConverter, FormulaEncoding,
    FormulaRenderer, extract_formula_sources,
};
pub use inline_resources::{HttpFetcher, InliningResult, ResourceFetcher, inline_images};
pub use pipeline::{
    CopyStatus, ExportPipeline, ExportPipelineBuilder, ExportReport, LogStatusSink, Notice,
    PreparedExport, StatusSink,
};
pub use publishing::{HttpImageHost, ImageBlob, ImageHost, LocalStore, VaultStore};
pub use sanitizer::{HeadlessHost, RenderHost, Sanitizer};

/// Export the preview in `html` to the system clipboard with default collaborators
///
/// `markdown` supplies formula sources in document order when available.
pub async fn copy_preview(
    config: ExportConfig,
    html: &str,
    markdown: Option<&str>,
) -> ExportResult<ExportReport> {
    let pipeline = ExportPipeline::builder(config).build()?;
    pipeline.copy_html(html, markdown).await
}
