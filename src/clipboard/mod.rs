//! Clipboard export with ordered fallback tiers
//!
//! 1. multi-item: HTML item plus one item per image blob
//! 2. single-item: HTML item only
//! 3. auto-host: upload embedded images, retry single-item once
//! 4. rich-paste: the backend renders and copies the HTML itself
//! 5. plain-text: the raw HTML as text

pub mod system;
pub mod tiers;
pub mod types;
pub mod writer;

use async_trait::async_trait;

pub use system::SystemClipboard;
pub use types::{
    AttemptResult, ClipboardError, ClipboardItem, ClipboardPayload, TierAttempt, TierKind,
    WriteOutcome,
};
pub use writer::ClipboardWriter;

/// Access to a clipboard
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    /// Write all items in one clipboard transaction
    async fn write_items(&self, items: &[ClipboardItem]) -> Result<(), ClipboardError>;

    /// Render `html` into an editable surface, select it and copy the selection
    ///
    /// Returns the backend's success signal.
    async fn copy_rendered(&self, html: &str) -> bool;

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}
