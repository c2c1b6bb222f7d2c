//! Configuration module for the export pipeline
//!
//! `ExportConfig` groups sanitizer, formula, inlining, publishing and clipboard
//! settings. It deserializes from the plugin's JSON settings with defaults for
//! anything missing.

pub mod loader;
pub mod types;

pub use types::{
    AutoHostTrigger, ClipboardConfig, ExportConfig, FormulaConfig, FormulaImageFormat,
    InlineConfig, PublishConfig, SanitizeConfig,
};
