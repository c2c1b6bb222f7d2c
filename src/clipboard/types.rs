//! Clipboard payload, tier bookkeeping and errors

use thiserror::Error;

use crate::publishing::ImageBlob;

/// One clipboard item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardItem {
    /// Rich text with its plain-text alternative
    Html { html: String, plain_text: String },
    /// A single image
    Image(ImageBlob),
}

/// Everything an export puts on the clipboard
///
/// The HTML stays valid whether or not the image items are honored: its
/// `<img>` sources are self-contained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub html: String,
    pub plain_text: String,
    pub images: Vec<ImageBlob>,
}

impl ClipboardPayload {
    pub fn new(html: impl Into<String>, plain_text: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            plain_text: plain_text.into(),
            images: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<ImageBlob>) -> Self {
        self.images = images;
        self
    }

    pub fn html_item(&self, html: &str) -> ClipboardItem {
        ClipboardItem::Html {
            html: html.to_string(),
            plain_text: self.plain_text.clone(),
        }
    }
}

/// The fallback tiers, in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    MultiItem,
    SingleItem,
    AutoHost,
    RichPaste,
    PlainText,
}

impl TierKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::MultiItem => "multi-item",
            TierKind::SingleItem => "single-item",
            TierKind::AutoHost => "auto-host",
            TierKind::RichPaste => "rich-paste",
            TierKind::PlainText => "plain-text",
        }
    }
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one tier went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Succeeded,
    /// Preconditions not met; nothing was written
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAttempt {
    pub tier: TierKind,
    pub result: AttemptResult,
}

impl std::fmt::Display for TierAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.result {
            AttemptResult::Succeeded => write!(f, "{}: ok", self.tier),
            AttemptResult::Skipped(reason) => write!(f, "{}: skipped ({reason})", self.tier),
            AttemptResult::Failed(error) => write!(f, "{}: {error}", self.tier),
        }
    }
}

/// Result of a successful clipboard write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The tier that succeeded
    pub tier: TierKind,
    pub attempts: Vec<TierAttempt>,
    /// HTML that ended up on the clipboard
    pub html: String,
    /// The clipboard refused multiple items during this write
    pub multi_item_rejected: bool,
    /// Images uploaded by the auto-host tier
    pub hosted_images: usize,
}

/// Clipboard errors
#[derive(Debug, Clone, Error)]
pub enum ClipboardError {
    /// The system clipboard could not be opened
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    /// The backend refused a write
    #[error("Clipboard write failed: {0}")]
    Write(String),

    /// Every fallback tier failed
    #[error("All clipboard write attempts failed: {}", format_attempts(.attempts))]
    Exhausted { attempts: Vec<TierAttempt> },
}

impl ClipboardError {
    /// A later tier may still succeed after this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ClipboardError::Exhausted { .. })
    }
}

fn format_attempts(attempts: &[TierAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_lists_every_attempt() {
        let err = ClipboardError::Exhausted {
            attempts: vec![
                TierAttempt {
                    tier: TierKind::MultiItem,
                    result: AttemptResult::Skipped("no images".into()),
                },
                TierAttempt {
                    tier: TierKind::PlainText,
                    result: AttemptResult::Failed("denied".into()),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "All clipboard write attempts failed: multi-item: skipped (no images); plain-text: denied"
        );
        assert!(!err.is_recoverable());
        assert!(ClipboardError::Write("x".into()).is_recoverable());
    }
}
