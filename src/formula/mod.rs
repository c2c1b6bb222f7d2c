//! Formula discovery and conversion
//!
//! MathJax and KaTeX output cannot survive a paste into the publishing editor:
//! it depends on stylesheets and web fonts the editor strips. Each formula is
//! located, its source recovered, re-rendered to SVG and replaced by a sized
//! `<img>`.

pub mod converter;
pub mod locator;
pub mod renderer;
pub mod source;

pub use converter::{ConversionSummary, FormulaConverter, FormulaFailure};
pub use locator::{find_candidates, is_display};
pub use renderer::{CommandRenderer, FnRenderer, FormulaRenderer, UnavailableRenderer};
pub use source::{ExtractedFormula, Resolution, extract_formula_sources, resolve_source};

use kuchiki::NodeRef;

use crate::sanitizer::Size;

/// Markup language of a formula source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaEncoding {
    Tex,
    Mml,
}

impl FormulaEncoding {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaEncoding::Tex => "tex",
            FormulaEncoding::Mml => "mml",
        }
    }
}

impl std::fmt::Display for FormulaEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located formula element, as seen before replacement
#[derive(Debug, Clone)]
pub struct FormulaNode {
    pub node: NodeRef,
    pub source_text: Option<String>,
    pub encoding: FormulaEncoding,
    pub display_mode: bool,
    pub bounding_size: Size,
}

/// What replaces a formula node
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionArtifact {
    /// Normalized SVG markup
    Vector(String),
    /// PNG data URI
    Raster(String),
}

impl ConversionArtifact {
    /// Data URI for an `<img src>`
    #[must_use]
    pub fn data_uri(&self) -> String {
        match self {
            ConversionArtifact::Vector(svg) => crate::utils::data_uri::encode_svg(svg),
            ConversionArtifact::Raster(uri) => uri.clone(),
        }
    }
}
