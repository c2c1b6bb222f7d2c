//! Shared constants for the export pipeline
//!
//! Default values used across modules, kept in one place to avoid magic numbers.

/// Fallback width for a formula image when neither layout nor markup gives a size
pub const DEFAULT_FORMULA_WIDTH: f32 = 300.0;

/// Fallback height for a formula image when neither layout nor markup gives a size
pub const DEFAULT_FORMULA_HEIGHT: f32 = 100.0;

/// Oversampling factor for rasterized formulas: 3x
///
/// The PNG is rendered at three times the display size and declared at 1x,
/// which keeps formulas crisp on high-DPI screens and after platform recompression.
pub const RASTER_OVERSAMPLING: f32 = 3.0;

/// Largest side, in pixels, we are willing to allocate for one raster
pub const MAX_RASTER_SIDE: u32 = 8192;

/// Pixels per `em` when no font size is known
pub const DEFAULT_FONT_SIZE_PX: f32 = 16.0;

/// Longest formula source handed to the renderer (characters)
///
/// Pathological sources can make typesetting very slow.
pub const MAX_FORMULA_SOURCE_LEN: usize = 10_000;

/// Default time budget for one formula conversion
pub const DEFAULT_FORMULA_TIMEOUT_MS: u64 = 10_000;

/// Class of the content wrapper the preview renderer puts around the document
pub const CONTENT_SECTION_CLASS: &str = "mp-content-section";

/// Attribute carrying TeX source on a formula wrapper
pub const TEX_SOURCE_ATTR: &str = "data-tex";

/// Attribute carrying MathML source on a formula wrapper
pub const MML_SOURCE_ATTR: &str = "data-mml";

/// Inline style of the hidden scratch container used while computing styles
pub const SCRATCH_CONTAINER_STYLE: &str =
    "position: absolute; left: -99999px; top: -99999px; visibility: hidden; pointer-events: none";

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Browser-like user agent for image downloads
///
/// Some image hosts refuse requests without a browser user agent.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
