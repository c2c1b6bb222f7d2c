//! Tiered clipboard writer

use std::sync::Arc;

use log::{debug, info, warn};

use super::ClipboardBackend;
use super::tiers::{
    AutoHostTier, FallbackTier, MultiItemTier, PlainTextTier, RichPasteTier, SingleItemTier,
    WriteState,
};
use super::types::{AttemptResult, ClipboardError, ClipboardPayload, TierAttempt, WriteOutcome};
use crate::config::ClipboardConfig;
use crate::inline_resources::ResourceFetcher;
use crate::publishing::ImageHost;

/// Writes a payload through the fallback tiers until one succeeds
pub struct ClipboardWriter {
    backend: Arc<dyn ClipboardBackend>,
    tiers: Vec<Box<dyn FallbackTier>>,
}

impl ClipboardWriter {
    /// Writer without an image host and so without the auto-host tier
    pub fn new(backend: Arc<dyn ClipboardBackend>, config: ClipboardConfig) -> Self {
        Self::build(backend, config, None)
    }

    /// Writer whose auto-host tier may upload embedded images
    pub fn with_image_host(
        backend: Arc<dyn ClipboardBackend>,
        config: ClipboardConfig,
        host: Arc<dyn ImageHost>,
        fetcher: Arc<dyn ResourceFetcher>,
        token: impl Into<String>,
    ) -> Self {
        Self::build(backend, config, Some((host, fetcher, token.into())))
    }

    fn build(
        backend: Arc<dyn ClipboardBackend>,
        config: ClipboardConfig,
        host: Option<(Arc<dyn ImageHost>, Arc<dyn ResourceFetcher>, String)>,
    ) -> Self {
        let mut tiers: Vec<Box<dyn FallbackTier>> = vec![
            Box::new(MultiItemTier {
                config: config.clone(),
            }),
            Box::new(SingleItemTier),
        ];
        if let Some((host, fetcher, token)) = host {
            tiers.push(Box::new(AutoHostTier {
                host,
                fetcher,
                token,
                config,
            }));
        }
        tiers.push(Box::new(RichPasteTier));
        tiers.push(Box::new(PlainTextTier));
        Self { backend, tiers }
    }

    /// Write `payload`, falling back tier by tier
    ///
    /// `hosting_requested` means the caller already replaced embedded images
    /// with hosted URLs, which disables the auto-host tier.
    pub async fn write(
        &self,
        payload: &ClipboardPayload,
        hosting_requested: bool,
    ) -> Result<WriteOutcome, ClipboardError> {
        let mut state = WriteState::new(payload, hosting_requested);
        let mut attempts = Vec::with_capacity(self.tiers.len());

        for tier in &self.tiers {
            let result = tier.attempt(self.backend.as_ref(), &mut state).await;
            let succeeded = result == AttemptResult::Succeeded;
            match &result {
                AttemptResult::Succeeded => info!("Clipboard write succeeded via {} tier", tier.kind()),
                AttemptResult::Skipped(reason) => {
                    debug!("Clipboard {} tier skipped: {reason}", tier.kind());
                }
                AttemptResult::Failed(error) => {
                    warn!("Clipboard {} tier failed: {error}", tier.kind());
                    state.last_error = Some(error.clone());
                }
            }
            attempts.push(TierAttempt {
                tier: tier.kind(),
                result,
            });

            if succeeded {
                return Ok(WriteOutcome {
                    tier: tier.kind(),
                    attempts,
                    html: state.html,
                    multi_item_rejected: state.multi_item_rejected,
                    hosted_images: state.hosted_images,
                });
            }
        }

        Err(ClipboardError::Exhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardItem, TierKind};
    use crate::publishing::ImageBlob;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that refuses multi-item writes and records the rest
    #[derive(Default)]
    struct SingleOnly {
        writes: Mutex<Vec<usize>>,
        fail_all: bool,
    }

    #[async_trait]
    impl ClipboardBackend for SingleOnly {
        async fn write_items(&self, items: &[ClipboardItem]) -> Result<(), ClipboardError> {
            self.writes.lock().unwrap().push(items.len());
            if self.fail_all {
                return Err(ClipboardError::Write("denied".into()));
            }
            if items.len() > 1 {
                return Err(ClipboardError::Write(
                    "NotAllowedError: Support for multiple ClipboardItems is not implemented.".into(),
                ));
            }
            Ok(())
        }

        async fn copy_rendered(&self, _html: &str) -> bool {
            !self.fail_all
        }

        async fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            if self.fail_all {
                Err(ClipboardError::Write("denied".into()))
            } else {
                Ok(())
            }
        }
    }

    fn payload_with_image() -> ClipboardPayload {
        ClipboardPayload::new("<p>x</p>", "x")
            .with_images(vec![ImageBlob::new(vec![1, 2], "image/png")])
    }

    #[tokio::test]
    async fn test_multi_item_rejection_falls_back_to_single_item() {
        let backend = Arc::new(SingleOnly::default());
        let writer = ClipboardWriter::new(backend.clone(), ClipboardConfig::default());

        let outcome = writer.write(&payload_with_image(), false).await.unwrap();

        assert_eq!(outcome.tier, TierKind::SingleItem);
        assert!(outcome.multi_item_rejected);
        assert_eq!(*backend.writes.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_without_images_multi_item_is_skipped() {
        let backend = Arc::new(SingleOnly::default());
        let writer = ClipboardWriter::new(backend.clone(), ClipboardConfig::default());

        let outcome = writer
            .write(&ClipboardPayload::new("<p>x</p>", "x"), false)
            .await
            .unwrap();

        assert_eq!(outcome.tier, TierKind::SingleItem);
        assert!(matches!(outcome.attempts[0].result, AttemptResult::Skipped(_)));
        assert_eq!(*backend.writes.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_tier() {
        let backend = Arc::new(SingleOnly {
            fail_all: true,
            ..SingleOnly::default()
        });
        let writer = ClipboardWriter::new(backend, ClipboardConfig::default());

        let err = writer.write(&payload_with_image(), false).await.unwrap_err();
        let ClipboardError::Exhausted { attempts } = err else {
            panic!("expected exhaustion");
        };
        let tiers: Vec<TierKind> = attempts.iter().map(|a| a.tier).collect();
        assert_eq!(
            tiers,
            vec![
                TierKind::MultiItem,
                TierKind::SingleItem,
                TierKind::RichPaste,
                TierKind::PlainText
            ]
        );
    }
}
