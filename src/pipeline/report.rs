//! What an export did

use crate::clipboard::{TierKind, WriteOutcome};
use crate::formula::ConversionSummary;
use crate::inline_resources::InliningResult;
use crate::publishing::PublishSummary;

/// Per-stage results of one export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    /// Length of the exported HTML in bytes
    pub html_len: usize,
    pub formulas: ConversionSummary,
    pub images: InliningResult,
    pub fonts: InliningResult,
    pub publishing: PublishSummary,
    /// Tier that put the payload on the clipboard
    pub clipboard_tier: Option<TierKind>,
    pub multi_item_rejected: bool,
    /// Images uploaded by the clipboard writer on its own
    pub auto_hosted_images: usize,
}

impl ExportReport {
    pub(crate) fn record_write(&mut self, outcome: &WriteOutcome) {
        self.clipboard_tier = Some(outcome.tier);
        self.multi_item_rejected = outcome.multi_item_rejected;
        self.auto_hosted_images = outcome.hosted_images;
        self.html_len = outcome.html.len();
    }

    /// One-line summary for logs and the CLI
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} bytes; formulas {}/{} replaced ({} rasterized, {} missed, {} failed); images {} inlined, {} failed",
            self.html_len,
            self.formulas.replaced(),
            self.formulas.candidates,
            self.formulas.rasterized,
            self.formulas.misses,
            self.formulas.failures.len(),
            self.images.successes,
            self.images.failures.len(),
        );
        if self.publishing.rewritten() > 0 {
            line.push_str(&format!(
                "; {} uploaded, {} saved",
                self.publishing.uploaded, self.publishing.saved
            ));
        }
        if let Some(tier) = self.clipboard_tier {
            line.push_str(&format!("; copied via {tier}"));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_mentions_tier() {
        let report = ExportReport {
            html_len: 10,
            clipboard_tier: Some(TierKind::SingleItem),
            ..ExportReport::default()
        };
        let line = report.summary_line();
        assert!(line.starts_with("10 bytes"));
        assert!(line.ends_with("copied via single-item"));
    }
}
