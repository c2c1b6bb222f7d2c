//! Core configuration types for the export pipeline
//!
//! Every struct is `#[serde(default)]`, so a partial plugin `data.json` merges
//! over the defaults field by field.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_FORMULA_HEIGHT, DEFAULT_FORMULA_TIMEOUT_MS, DEFAULT_FORMULA_WIDTH,
    MAX_FORMULA_SOURCE_LEN, RASTER_OVERSAMPLING,
};

/// Main configuration for one export pipeline instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub sanitize: SanitizeConfig,
    pub formula: FormulaConfig,
    pub inline: InlineConfig,
    pub publish: PublishConfig,
    pub clipboard: ClipboardConfig,
}

/// Attribute and class policy for the DOM sanitizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Attributes kept on ordinary (non-vector) elements
    pub allowed_attributes: Vec<String>,

    /// Attribute name prefixes stripped everywhere, including inside SVG/MathML
    ///
    /// Covers event handlers, element identifiers and generic marker attributes.
    pub disallowed_attribute_prefixes: Vec<String>,

    /// Attributes kept even though they match a disallowed prefix
    ///
    /// The formula converter reads formula source back from these.
    pub preserved_attributes: Vec<String>,

    /// Class names kept verbatim
    pub allowed_classes: Vec<String>,

    /// Class name prefixes kept (math engines' styling conventions)
    pub allowed_class_prefixes: Vec<String>,

    /// Elements removed with their whole subtree
    pub removed_elements: Vec<String>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            allowed_attributes: strings(&[
                "style", "class", "src", "alt", "href", "title", "width", "height", "colspan",
                "rowspan", "align", "start", "display", "jax",
            ]),
            disallowed_attribute_prefixes: strings(&["on", "data-", "aria-", "id"]),
            preserved_attributes: strings(&["data-tex", "data-mml"]),
            allowed_classes: strings(&["math", "mp-content-section"]),
            allowed_class_prefixes: strings(&["katex", "mjx", "MathJax", "math-", "mp-math"]),
            removed_elements: strings(&["script", "iframe", "frame", "object", "embed"]),
        }
    }
}

/// Output format of converted formulas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaImageFormat {
    /// Embedded SVG: resolution independent, accepted by most editors
    #[default]
    Svg,
    /// PNG rasterized at the oversampling factor
    Png,
}

/// Formula discovery and conversion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    /// Artifact embedded in place of each formula
    ///
    /// Default: svg
    pub image_format: FormulaImageFormat,

    /// Raster oversampling factor
    ///
    /// Default: 3.0, Range: (0, 8]
    pub oversampling: f32,

    /// Image size used when neither layout nor markup provides one
    ///
    /// Default: 300x100
    pub default_width: f32,
    pub default_height: f32,

    /// Longest source handed to the renderer, in characters
    ///
    /// Default: 10 000
    pub max_source_len: usize,

    /// Time budget for a single conversion in milliseconds
    ///
    /// Default: 10 000
    pub timeout_ms: u64,

    /// Rasterize candidates whose source could not be resolved
    ///
    /// When false (default) such nodes are left untouched in the output.
    pub rasterize_unresolved: bool,

    /// External converter invoked for each formula, source on stdin
    ///
    /// `{encoding}` expands to `tex` or `mml`, `{display}` to `true` or `false`.
    /// Default: empty (no renderer, formulas are rasterized)
    pub renderer_command: Vec<String>,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            image_format: FormulaImageFormat::Svg,
            oversampling: RASTER_OVERSAMPLING,
            default_width: DEFAULT_FORMULA_WIDTH,
            default_height: DEFAULT_FORMULA_HEIGHT,
            max_source_len: MAX_FORMULA_SOURCE_LEN,
            timeout_ms: DEFAULT_FORMULA_TIMEOUT_MS,
            rasterize_unresolved: false,
            renderer_command: Vec::new(),
        }
    }
}

impl FormulaConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Download timeouts and size limits for resource inlining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineConfig {
    /// Timeout for image downloads in seconds
    ///
    /// Default: 60
    pub image_timeout_secs: u64,

    /// Timeout for font downloads in seconds
    ///
    /// Default: 30
    pub font_timeout_secs: u64,

    /// Maximum size for image downloads (bytes)
    ///
    /// Typical inlined images: 10-500KB, large photos: 1-3MB.
    /// Default: 5MB
    pub max_image_size: usize,

    /// Maximum size for font downloads (bytes)
    ///
    /// Default: 2MB
    pub max_font_size: usize,

    /// Images larger than this keep their original URL instead of a data URI
    ///
    /// Default: None (everything is inlined)
    pub max_inline_size_bytes: Option<usize>,

    /// Base URL for relative image sources
    pub base_url: Option<String>,

    /// Vault root on disk, used to resolve `app://` resource URLs
    pub vault_base_path: Option<PathBuf>,
}

impl Default for InlineConfig {
    fn default() -> Self {
        Self {
            image_timeout_secs: 60,
            font_timeout_secs: 30,
            max_image_size: 5 * 1024 * 1024,
            max_font_size: 2 * 1024 * 1024,
            max_inline_size_bytes: None,
            base_url: None,
            vault_base_path: None,
        }
    }
}

impl InlineConfig {
    #[must_use]
    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    #[must_use]
    pub fn font_timeout(&self) -> Duration {
        Duration::from_secs(self.font_timeout_secs)
    }
}

/// Optional publishing of images to an external host or the vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Upload every image and reference it by its hosted URL
    ///
    /// Default: false
    pub upload_images: bool,

    /// Upload endpoint of the image host
    pub host_endpoint: Option<String>,

    /// Credential for the image host
    pub auth_token: Option<String>,

    /// Authorization header formats tried in order on 401/403
    ///
    /// `{token}` is replaced with the credential.
    pub auth_schemes: Vec<String>,

    /// Upload timeout in seconds
    ///
    /// Default: 60
    pub upload_timeout_secs: u64,

    /// Vault folder that receives a copy of every embedded image
    ///
    /// Default: None (nothing is persisted)
    pub save_folder: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            upload_images: false,
            host_endpoint: None,
            auth_token: None,
            auth_schemes: vec![
                "Bearer {token}".to_string(),
                "{token}".to_string(),
                "Token {token}".to_string(),
            ],
            upload_timeout_secs: 60,
            save_folder: None,
        }
    }
}

impl PublishConfig {
    #[must_use]
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// When the clipboard writer may upload images on its own and retry
///
/// Platforms report clipboard rejections with their own wording, so matching on
/// error text is fragile; it is a setting rather than a hardcoded rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AutoHostTrigger {
    Never,
    #[default]
    Always,
    OnErrorMatching { patterns: Vec<String> },
}

impl AutoHostTrigger {
    /// Whether the trigger fires for the given failure message
    #[must_use]
    pub fn fires_for(&self, message: &str) -> bool {
        match self {
            AutoHostTrigger::Never => false,
            AutoHostTrigger::Always => true,
            AutoHostTrigger::OnErrorMatching { patterns } => matches_any(message, patterns),
        }
    }
}

/// Clipboard writer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Add each embedded raster image as its own clipboard item
    ///
    /// Default: true
    pub attach_image_items: bool,

    /// Error text fragments meaning "this clipboard takes one item only"
    pub multi_item_rejection_patterns: Vec<String>,

    /// Auto-host-and-retry gate
    pub auto_host: AutoHostTrigger,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            attach_image_items: true,
            multi_item_rejection_patterns: vec![
                "multiple ClipboardItems".to_string(),
                "multiple clipboard items".to_string(),
                "one item".to_string(),
            ],
            auto_host: AutoHostTrigger::default(),
        }
    }
}

impl ClipboardConfig {
    #[must_use]
    pub fn is_multi_item_rejection(&self, message: &str) -> bool {
        matches_any(message, &self.multi_item_rejection_patterns)
    }
}

/// Case-insensitive substring match against any pattern
fn matches_any(message: &str, patterns: &[String]) -> bool {
    let message = message.to_lowercase();
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && message.contains(&pattern.to_lowercase()))
}
