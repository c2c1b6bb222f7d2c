//! Resource inlining: images and fonts as data URIs
//!
//! The publishing editor cannot reach vault files or most remote hosts, so
//! everything an export references is fetched and embedded.

pub mod fetcher;
pub mod fonts;
pub mod images;
pub mod types;

pub use fetcher::{HttpFetcher, ResourceFetcher, detect_mime};
pub use fonts::{FontFaceCache, inline_font_faces};
pub use images::inline_images;
pub use types::{FetchedResource, InliningError, InliningResult, ResourceType};
