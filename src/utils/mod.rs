pub mod constants;
pub mod css;
pub mod data_uri;
pub mod dom;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{SourceKind, classify_source, resolve_url};
