//! The clipboard export pipeline
//!
//! Sanitize a deep copy of the preview, convert formulas while the copy is
//! mounted, inline images, optionally publish them, then write the payload
//! to the clipboard through the fallback tiers. Every collaborator is passed
//! in at construction; nothing is global.

pub mod report;
pub mod status;

use std::rc::Rc;
use std::sync::Arc;

use kuchiki::NodeRef;
use log::{debug, info};

use crate::clipboard::{ClipboardBackend, ClipboardPayload, ClipboardWriter, SystemClipboard};
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::formula::{
    CommandRenderer, ExtractedFormula, FormulaConverter, FormulaRenderer, UnavailableRenderer,
    extract_formula_sources,
};
use crate::inline_resources::{FontFaceCache, HttpFetcher, ResourceFetcher, inline_images};
use crate::publishing::{
    HttpImageHost, ImageBlob, ImageHost, LocalStore, VaultStore, collect_image_references,
    publish_images,
};
use crate::sanitizer::{HeadlessHost, RenderHost, Sanitizer};
use crate::utils::constants::CONTENT_SECTION_CLASS;
use crate::utils::dom;

pub use report::ExportReport;
pub use status::{CopyStatus, LogStatusSink, Notice, StatusSink};

/// Image types the clipboard accepts as standalone image items
const CLIPBOARD_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif"];

/// A finished payload that has not been written anywhere yet
#[derive(Debug, Clone)]
pub struct PreparedExport {
    pub html: String,
    pub plain_text: String,
    pub images: Vec<ImageBlob>,
    pub report: ExportReport,
}

impl PreparedExport {
    #[must_use]
    pub fn payload(&self) -> ClipboardPayload {
        ClipboardPayload::new(self.html.clone(), self.plain_text.clone())
            .with_images(self.images.clone())
    }
}

pub struct ExportPipeline {
    config: ExportConfig,
    sanitizer: Sanitizer,
    host: Rc<dyn RenderHost>,
    converter: FormulaConverter,
    fetcher: Arc<dyn ResourceFetcher>,
    image_host: Option<Arc<dyn ImageHost>>,
    local_store: Option<Arc<dyn LocalStore>>,
    writer: ClipboardWriter,
    status: Rc<dyn StatusSink>,
}

impl ExportPipeline {
    #[must_use]
    pub fn builder(config: ExportConfig) -> ExportPipelineBuilder {
        ExportPipelineBuilder::new(config)
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Produce the export payload for `root` without touching the clipboard
    ///
    /// `sources` are the formula sources in document order, usually from
    /// `extract_formula_sources`; pass an empty slice to read them from the DOM.
    pub async fn prepare(
        &self,
        root: &NodeRef,
        sources: &[ExtractedFormula],
    ) -> ExportResult<PreparedExport> {
        let tree = self.sanitizer.sanitize(root)?;
        if tree.root().select_first(&format!("section.{CONTENT_SECTION_CLASS}")).is_err() {
            return Err(ExportError::MissingContentSection(CONTENT_SECTION_CLASS));
        }

        let mut report = ExportReport::default();

        let fonts = FontFaceCache::new(
            self.host.font_faces(),
            self.fetcher.clone(),
            self.config.inline.base_url.clone(),
        );
        report.formulas = self
            .converter
            .convert_formulas(tree.root(), self.host.as_ref(), &fonts, sources)
            .await;
        report.fonts = fonts.result();
        let root = tree.release();

        report.images = inline_images(&root, self.fetcher.as_ref(), &self.config.inline).await;

        report.publishing = publish_images(
            &root,
            self.fetcher.as_ref(),
            self.image_host.as_deref(),
            self.local_store.as_deref(),
            &self.config.publish,
        )
        .await;

        let html = dom::outer_html(&root).map_err(|e| ExportError::Serialization(format!("{e:#}")))?;
        let plain_text = root.text_contents();
        let images = clipboard_images(&root);
        report.html_len = html.len();
        info!("Prepared export: {}", report.summary_line());

        Ok(PreparedExport {
            html,
            plain_text,
            images,
            report,
        })
    }

    /// Prepare `root` and write it to the clipboard
    pub async fn copy(
        &self,
        root: &NodeRef,
        sources: &[ExtractedFormula],
    ) -> ExportResult<ExportReport> {
        self.status.set_status(CopyStatus::InFlight);

        let prepared = match self.prepare(root, sources).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.status.set_status(CopyStatus::Failed);
                if e.is_contract_violation() {
                    self.status.notify(Notice::InvalidPreview(e.to_string()));
                } else {
                    self.status.notify(Notice::CopyFailed(e.to_string()));
                }
                return Err(e);
            }
        };

        let hosting_requested = prepared.report.publishing.uploaded > 0;
        match self.writer.write(&prepared.payload(), hosting_requested).await {
            Ok(outcome) => {
                let mut report = prepared.report;
                report.record_write(&outcome);
                self.status.set_status(CopyStatus::Succeeded);
                self.status.notify(Notice::Copied);
                Ok(report)
            }
            Err(e) => {
                self.status.set_status(CopyStatus::Failed);
                self.status.notify(Notice::CopyFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Parse preview HTML, take formula sources from `markdown`, and copy
    pub async fn copy_html(&self, html: &str, markdown: Option<&str>) -> ExportResult<ExportReport> {
        let root = match dom::parse_root_element(html) {
            Some(root) => root,
            None => {
                self.status.set_status(CopyStatus::Failed);
                self.status.notify(Notice::InvalidPreview(ExportError::EmptyPreview.to_string()));
                return Err(ExportError::EmptyPreview);
            }
        };
        let sources = markdown.map(extract_formula_sources).unwrap_or_default();
        self.copy(&root, &sources).await
    }

    /// `prepare` over preview HTML and optional Markdown
    pub async fn prepare_html(&self, html: &str, markdown: Option<&str>) -> ExportResult<PreparedExport> {
        let root = dom::parse_root_element(html).ok_or(ExportError::EmptyPreview)?;
        let sources = markdown.map(extract_formula_sources).unwrap_or_default();
        self.prepare(&root, &sources).await
    }
}

/// Raster images embedded in the final document, for the multi-item write
fn clipboard_images(root: &NodeRef) -> Vec<ImageBlob> {
    collect_image_references(root)
        .iter()
        .filter_map(|reference| ImageBlob::from_data_uri(reference.src()))
        .filter(|blob| CLIPBOARD_IMAGE_TYPES.contains(&blob.mime.as_str()))
        .collect()
}

/// Builder for [`ExportPipeline`]
///
/// Collaborators left unset are derived from the config: a headless render
/// host, the configured formula renderer command, an HTTP fetcher, the
/// configured image host and vault store, the system clipboard and a logging
/// status sink.
pub struct ExportPipelineBuilder {
    config: ExportConfig,
    stylesheets: Vec<String>,
    host: Option<Rc<dyn RenderHost>>,
    renderer: Option<Arc<dyn FormulaRenderer>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    image_host: Option<Arc<dyn ImageHost>>,
    local_store: Option<Arc<dyn LocalStore>>,
    clipboard: Option<Arc<dyn ClipboardBackend>>,
    status: Option<Rc<dyn StatusSink>>,
}

impl ExportPipelineBuilder {
    fn new(config: ExportConfig) -> Self {
        Self {
            config,
            stylesheets: Vec::new(),
            host: None,
            renderer: None,
            fetcher: None,
            image_host: None,
            local_store: None,
            clipboard: None,
            status: None,
        }
    }

    /// Theme and math stylesheets for the default headless host
    #[must_use]
    pub fn stylesheets(mut self, stylesheets: Vec<String>) -> Self {
        self.stylesheets = stylesheets;
        self
    }

    #[must_use]
    pub fn render_host(mut self, host: Rc<dyn RenderHost>) -> Self {
        self.host = Some(host);
        self
    }

    #[must_use]
    pub fn formula_renderer(mut self, renderer: Arc<dyn FormulaRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn image_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.image_host = Some(host);
        self
    }

    #[must_use]
    pub fn local_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    #[must_use]
    pub fn clipboard(mut self, clipboard: Arc<dyn ClipboardBackend>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    #[must_use]
    pub fn status_sink(mut self, status: Rc<dyn StatusSink>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> ExportResult<ExportPipeline> {
        let config = self.config;
        config.validate()?;

        let host: Rc<dyn RenderHost> = match self.host {
            Some(host) => host,
            None => Rc::new(HeadlessHost::new(&self.stylesheets)),
        };
        let renderer: Arc<dyn FormulaRenderer> = match self.renderer {
            Some(renderer) => renderer,
            None => match CommandRenderer::from_command_line(&config.formula.renderer_command) {
                Some(command) => Arc::new(command),
                None => {
                    debug!("No formula renderer command configured, formulas will be rasterized");
                    Arc::new(UnavailableRenderer)
                }
            },
        };
        let fetcher: Arc<dyn ResourceFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(config.inline.clone())?),
        };
        let image_host: Option<Arc<dyn ImageHost>> = match self.image_host {
            Some(host) => Some(host),
            None => HttpImageHost::from_config(&config.publish)?
                .map(|host| Arc::new(host) as Arc<dyn ImageHost>),
        };
        let local_store: Option<Arc<dyn LocalStore>> = match self.local_store {
            Some(store) => Some(store),
            None => config
                .inline
                .vault_base_path
                .clone()
                .filter(|_| config.publish.save_folder.is_some())
                .map(|vault| Arc::new(VaultStore::new(vault)) as Arc<dyn LocalStore>),
        };
        let clipboard: Arc<dyn ClipboardBackend> = match self.clipboard {
            Some(clipboard) => clipboard,
            None => Arc::new(SystemClipboard::new()),
        };

        let writer = match &image_host {
            Some(image_host) => ClipboardWriter::with_image_host(
                clipboard,
                config.clipboard.clone(),
                image_host.clone(),
                fetcher.clone(),
                config.publish.auth_token.clone().unwrap_or_default(),
            ),
            None => ClipboardWriter::new(clipboard, config.clipboard.clone()),
        };

        Ok(ExportPipeline {
            sanitizer: Sanitizer::new(&config.sanitize, host.clone()),
            converter: FormulaConverter::new(renderer, config.formula.clone()),
            host,
            fetcher,
            image_host,
            local_store,
            writer,
            status: self.status.unwrap_or_else(|| Rc::new(LogStatusSink)),
            config,
        })
    }
}
