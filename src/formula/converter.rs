//! Formula conversion: render every candidate and swap it for an `<img>`

use std::sync::Arc;

use futures::future::join_all;
use kuchiki::NodeRef;
use log::{debug, info, warn};

use super::locator::{find_candidates, is_display};
use super::renderer::FormulaRenderer;
use super::source::{ExtractedFormula, Resolution, resolve_source};
use super::{ConversionArtifact, FormulaEncoding, FormulaNode};
use crate::config::{FormulaConfig, FormulaImageFormat};
use crate::error::FormulaError;
use crate::inline_resources::FontFaceCache;
use crate::raster::{self, RasterOptions, normalize_svg};
use crate::sanitizer::{RenderHost, Size};
use crate::utils::css;
use crate::utils::dom;
use crate::utils::string_utils::preview_for_log;

/// A formula that could not be converted to vector markup
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaFailure {
    /// Position among the discovered candidates
    pub index: usize,
    pub source_preview: String,
    pub error: String,
}

/// Counts for one conversion pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionSummary {
    pub candidates: usize,
    /// Replaced by a vector (or vector-derived PNG) image
    pub converted: usize,
    /// Replaced by the raster fallback
    pub rasterized: usize,
    /// No source could be resolved
    pub misses: usize,
    pub failures: Vec<FormulaFailure>,
}

impl ConversionSummary {
    #[must_use]
    pub fn replaced(&self) -> usize {
        self.converted + self.rasterized
    }
}

pub struct FormulaConverter {
    renderer: Arc<dyn FormulaRenderer>,
    config: FormulaConfig,
}

impl FormulaConverter {
    pub fn new(renderer: Arc<dyn FormulaRenderer>, config: FormulaConfig) -> Self {
        Self { renderer, config }
    }

    /// Replace every formula under `root` with an image, in place
    ///
    /// `root` should be mounted in `host` so sizes can be measured. Conversions
    /// run concurrently; a failed conversion falls back to rasterizing the node
    /// with the font faces it uses, inlined from `fonts` on demand.
    pub async fn convert_formulas(
        &self,
        root: &NodeRef,
        host: &dyn RenderHost,
        fonts: &FontFaceCache,
        sources: &[ExtractedFormula],
    ) -> ConversionSummary {
        let candidates = find_candidates(root);
        let count = candidates.len();
        let mut summary = ConversionSummary {
            candidates: count,
            ..ConversionSummary::default()
        };
        if count == 0 {
            return summary;
        }
        if !sources.is_empty() && sources.len() != count {
            debug!(
                "{} extracted sources for {count} formula nodes, preferring sources in the DOM",
                sources.len()
            );
        }

        let located: Vec<(FormulaNode, Resolution)> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, node)| self.locate(node, index, count, host, sources))
            .collect();

        let outcomes = join_all(located.iter().map(|(_, resolution)| async move {
            match resolution {
                Resolution::Source {
                    text,
                    encoding,
                    display,
                } => Some(self.render_bounded(text, *encoding, *display).await),
                Resolution::Vector(svg) => Some(Ok(svg.clone())),
                Resolution::Unresolved => None,
            }
        }))
        .await;

        let raster_options = RasterOptions::from(&self.config);

        for (index, ((formula, _), outcome)) in located.iter().zip(outcomes).enumerate() {
            let artifact = match outcome {
                Some(Ok(markup)) => match normalize_svg(&markup) {
                    Some(svg) => {
                        summary.converted += 1;
                        self.vector_artifact(svg, formula.bounding_size)
                    }
                    None => {
                        self.record_failure(&mut summary, index, formula, &FormulaError::NotVector);
                        summary.rasterized += 1;
                        self.rasterize(formula, host, fonts, &raster_options).await
                    }
                },
                Some(Err(e)) => {
                    self.record_failure(&mut summary, index, formula, &e);
                    summary.rasterized += 1;
                    self.rasterize(formula, host, fonts, &raster_options).await
                }
                None => {
                    summary.misses += 1;
                    if !self.config.rasterize_unresolved {
                        debug!("Formula #{index} has no resolvable source, leaving it in place");
                        continue;
                    }
                    summary.rasterized += 1;
                    self.rasterize(formula, host, fonts, &raster_options).await
                }
            };

            match build_image(&artifact.data_uri(), formula) {
                Some(img) => dom::replace_node(&formula.node, img),
                None => warn!("Failed to create image element for formula #{index}"),
            }
        }

        info!(
            "Converted {} of {} formulas ({} rasterized, {} unresolved, {} failed)",
            summary.replaced(),
            summary.candidates,
            summary.rasterized,
            summary.misses,
            summary.failures.len()
        );
        summary
    }

    async fn rasterize(
        &self,
        formula: &FormulaNode,
        host: &dyn RenderHost,
        fonts: &FontFaceCache,
        options: &RasterOptions,
    ) -> ConversionArtifact {
        let faces = if raster::uses_font_faces(&formula.node) {
            fonts
                .faces_for(&raster::fonts::used_families(&formula.node))
                .await
        } else {
            Vec::new()
        };
        ConversionArtifact::Raster(raster::rasterize(&formula.node, host, &faces, options).data_uri)
    }

    fn locate(
        &self,
        node: NodeRef,
        index: usize,
        count: usize,
        host: &dyn RenderHost,
        sources: &[ExtractedFormula],
    ) -> (FormulaNode, Resolution) {
        let display = is_display(&node);
        let resolution = resolve_source(&node, index, display, sources, count);
        let (source_text, encoding, display_mode) = match &resolution {
            Resolution::Source {
                text,
                encoding,
                display,
            } => (Some(text.clone()), *encoding, *display),
            _ => (None, FormulaEncoding::Tex, display),
        };
        let bounding_size = self.layout_size(&node, host);

        (
            FormulaNode {
                node,
                source_text,
                encoding,
                display_mode,
                bounding_size,
            },
            resolution,
        )
    }

    /// Laid-out size, then scroll size, then the configured default
    fn layout_size(&self, node: &NodeRef, host: &dyn RenderHost) -> Size {
        host.bounding_rect(node)
            .filter(|s| !s.is_empty())
            .or_else(|| host.scroll_size(node).filter(|s| !s.is_empty()))
            .unwrap_or(Size::new(
                self.config.default_width,
                self.config.default_height,
            ))
    }

    async fn render_bounded(
        &self,
        source: &str,
        encoding: FormulaEncoding,
        display: bool,
    ) -> Result<String, FormulaError> {
        let len = source.chars().count();
        if len > self.config.max_source_len {
            return Err(FormulaError::SourceTooLong {
                len,
                max: self.config.max_source_len,
            });
        }

        match tokio::time::timeout(
            self.config.timeout(),
            self.renderer.to_vector(source, encoding, display),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FormulaError::Timeout(self.config.timeout_ms)),
        }
    }

    fn vector_artifact(&self, svg: String, size: Size) -> ConversionArtifact {
        if self.config.image_format == FormulaImageFormat::Svg {
            return ConversionArtifact::Vector(svg);
        }
        let (width, height) = size.ceil_px();
        match raster::render_png(&svg, width, height, self.config.oversampling) {
            Ok(png) => ConversionArtifact::Raster(crate::utils::data_uri::encode("image/png", &png)),
            Err(e) => {
                debug!("Keeping SVG for formula: {e}");
                ConversionArtifact::Vector(svg)
            }
        }
    }

    fn record_failure(
        &self,
        summary: &mut ConversionSummary,
        index: usize,
        formula: &FormulaNode,
        error: &FormulaError,
    ) {
        let source_preview = formula
            .source_text
            .as_deref()
            .map(|s| preview_for_log(s, 60))
            .unwrap_or_default();
        warn!("Formula #{index} `{source_preview}` falls back to rasterization: {error}");
        summary.failures.push(FormulaFailure {
            index,
            source_preview,
            error: error.to_string(),
        });
    }
}

/// `<img>` replacing `formula`, sized at 1x
fn build_image(src: &str, formula: &FormulaNode) -> Option<NodeRef> {
    let img = dom::parse_element("<img>", "img")?;
    let (width, height) = formula.bounding_size.ceil_px();

    let placement = if formula.display_mode {
        "display: block; margin: 0.5em auto".to_string()
    } else {
        format!(
            "display: inline-block; vertical-align: {}",
            vertical_align(&formula.node).unwrap_or_else(|| "middle".to_string())
        )
    };

    dom::set_attr(&img, "src", src);
    dom::set_attr(&img, "width", width.to_string());
    dom::set_attr(&img, "height", height.to_string());
    dom::set_attr(
        &img,
        "style",
        format!("{placement}; width: {width}px; height: {height}px"),
    );
    if formula.encoding == FormulaEncoding::Tex
        && let Some(tex) = &formula.source_text
    {
        dom::set_attr(&img, "alt", tex.trim());
    }
    Some(img)
}

/// Baseline shift MathJax puts on its SVG, if any
fn vertical_align(node: &NodeRef) -> Option<String> {
    let svg = crate::raster::wrapper::find_svg(node)?;
    let style = css::parse_declarations(&dom::attr(&svg, "style")?);
    css::declaration(&style, "vertical-align").map(str::to_string)
}
