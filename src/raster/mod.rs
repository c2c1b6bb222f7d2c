//! Rasterization fallback
//!
//! Turns a DOM node into an image when vector conversion is impossible. The
//! result is always a displayable data URI: a 3x oversampled PNG when the
//! markup can be drawn, the vector markup itself when it cannot, and a blank
//! white PNG when there is nothing to draw.

pub mod fonts;
pub mod wrapper;

use std::sync::{Arc, LazyLock};

use kuchiki::NodeRef;
use log::{debug, warn};
use resvg::tiny_skia;
use resvg::usvg;

use crate::config::FormulaConfig;
use crate::error::RasterError;
use crate::sanitizer::{RenderHost, Size};
use crate::utils::constants::MAX_RASTER_SIDE;
use crate::utils::css::FontFaceRule;
use crate::utils::{data_uri, dom};

pub use wrapper::normalize_svg;

/// System fonts, loaded once per process
static FONT_DB: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    debug!("Loaded {} font faces for rasterization", db.len());
    Arc::new(db)
});

/// Which path produced the image
#[derive(Debug, Clone, PartialEq)]
pub enum RasterKind {
    /// Oversampled PNG
    Png,
    /// The vector markup could not be drawn and is embedded as SVG instead
    VectorFallback(String),
    /// Nothing to draw: a blank white PNG of the target size
    Blank,
}

/// A rasterized node: data URI plus the size it should be displayed at
#[derive(Debug, Clone, PartialEq)]
pub struct Rasterized {
    pub data_uri: String,
    pub size: Size,
    pub kind: RasterKind,
}

/// Rasterizer settings taken from the formula configuration
#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    pub oversampling: f32,
    pub default_size: Size,
}

impl From<&FormulaConfig> for RasterOptions {
    fn from(config: &FormulaConfig) -> Self {
        Self {
            oversampling: config.oversampling,
            default_size: Size::new(config.default_width, config.default_height),
        }
    }
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self::from(&FormulaConfig::default())
    }
}

/// True when rasterizing `node` synthesizes a wrapper that embeds font faces
#[must_use]
pub fn uses_font_faces(node: &NodeRef) -> bool {
    wrapper::find_svg(node).is_none() && has_content(node)
}

/// Rasterize `node`, falling back instead of failing
///
/// `fonts` are the `@font-face` rules available to a synthesized wrapper; only
/// the families the node uses are embedded.
#[must_use]
pub fn rasterize(
    node: &NodeRef,
    host: &dyn RenderHost,
    fonts: &[FontFaceRule],
    options: &RasterOptions,
) -> Rasterized {
    let standalone = wrapper::find_svg(node);
    let size = target_size(node, standalone.as_ref(), host, options);
    let (width, height) = size.ceil_px();

    let markup = match standalone {
        Some(_) => wrapper::standalone_svg(node),
        None if has_content(node) => dom::outer_html(node).ok().map(|html| {
            let font_css = fonts::collect_font_faces(node, fonts);
            wrapper::foreign_object_wrapper(&html, width, height, &font_css)
        }),
        None => None,
    };

    let Some(markup) = markup else {
        return blank(size, options);
    };

    match render_png(&markup, width, height, options.oversampling) {
        Ok(png) => Rasterized {
            data_uri: data_uri::encode("image/png", &png),
            size,
            kind: RasterKind::Png,
        },
        Err(e) => {
            debug!("Embedding vector markup instead of PNG: {e}");
            Rasterized {
                data_uri: data_uri::encode_svg(&markup),
                size,
                kind: RasterKind::VectorFallback(e.to_string()),
            }
        }
    }
}

/// Render SVG markup to PNG bytes at `width`x`height` times `oversampling`
pub fn render_png(
    markup: &str,
    width: u32,
    height: u32,
    oversampling: f32,
) -> Result<Vec<u8>, RasterError> {
    if let Some(reason) = wrapper::taint_reason(markup) {
        return Err(RasterError::Tainted(reason));
    }

    let options = usvg::Options {
        fontdb: FONT_DB.clone(),
        ..usvg::Options::default()
    };
    let tree =
        usvg::Tree::from_str(markup, &options).map_err(|e| RasterError::Load(e.to_string()))?;

    let (pixel_width, pixel_height) = oversampled(width, height, oversampling);
    let mut pixmap = tiny_skia::Pixmap::new(pixel_width, pixel_height).ok_or(
        RasterError::InvalidSize {
            width: pixel_width,
            height: pixel_height,
        },
    )?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let tree_size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        pixel_width as f32 / tree_size.width(),
        pixel_height as f32 / tree_size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| RasterError::Encode(e.to_string()))
}

/// Blank white PNG of `size`, declared at 1x
#[must_use]
pub fn blank(size: Size, options: &RasterOptions) -> Rasterized {
    let (width, height) = size.ceil_px();
    let (pixel_width, pixel_height) = oversampled(width, height, options.oversampling);
    let data_uri = match tiny_skia::Pixmap::new(pixel_width, pixel_height) {
        Some(mut pixmap) => {
            pixmap.fill(tiny_skia::Color::WHITE);
            match pixmap.encode_png() {
                Ok(png) => data_uri::encode("image/png", &png),
                Err(e) => {
                    warn!("Blank PNG encoding failed: {e}");
                    blank_svg(width, height)
                }
            }
        }
        None => blank_svg(width, height),
    };
    Rasterized {
        data_uri,
        size,
        kind: RasterKind::Blank,
    }
}

fn blank_svg(width: u32, height: u32) -> String {
    data_uri::encode_svg(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><rect width="100%" height="100%" fill="white"/></svg>"#
    ))
}

/// Pixel size after oversampling, clamped to `[1, MAX_RASTER_SIDE]` keeping the aspect ratio
fn oversampled(width: u32, height: u32, oversampling: f32) -> (u32, u32) {
    let w = (width as f32 * oversampling).ceil().max(1.0);
    let h = (height as f32 * oversampling).ceil().max(1.0);
    let cap = MAX_RASTER_SIDE as f32;
    if w.max(h) <= cap {
        return (w as u32, h as u32);
    }
    if w >= h {
        (MAX_RASTER_SIDE, (h * cap / w).floor().max(1.0) as u32)
    } else {
        ((w * cap / h).floor().max(1.0) as u32, MAX_RASTER_SIDE)
    }
}

/// Host layout, then the standalone SVG's declared size, then the default
fn target_size(
    node: &NodeRef,
    standalone: Option<&NodeRef>,
    host: &dyn RenderHost,
    options: &RasterOptions,
) -> Size {
    host.bounding_rect(node)
        .filter(|s| !s.is_empty())
        .or_else(|| standalone.and_then(|svg| host.scroll_size(svg)))
        .filter(|s| !s.is_empty())
        .unwrap_or(options.default_size)
}

fn has_content(node: &NodeRef) -> bool {
    node.children().any(|child| {
        child.as_element().is_some()
            || child
                .as_text()
                .is_some_and(|text| !text.borrow().trim().is_empty())
    })
}
