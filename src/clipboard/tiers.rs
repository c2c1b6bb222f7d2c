//! The fallback tiers
//!
//! Every tier has the same `attempt` signature. A tier that cannot run in the
//! current state reports `Skipped` instead of writing anything.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use super::ClipboardBackend;
use super::types::{AttemptResult, ClipboardPayload, TierKind};
use crate::config::ClipboardConfig;
use crate::inline_resources::ResourceFetcher;
use crate::publishing::{ImageHost, host_embedded_images};

/// State shared by the tiers of one write
#[derive(Debug)]
pub struct WriteState<'a> {
    pub payload: &'a ClipboardPayload,
    /// HTML the next tier writes; the auto-host tier replaces it
    pub html: String,
    /// Error text of the most recent failed tier
    pub last_error: Option<String>,
    pub multi_item_rejected: bool,
    /// The caller already hosted the images
    pub hosting_requested: bool,
    pub hosted_images: usize,
}

impl<'a> WriteState<'a> {
    pub fn new(payload: &'a ClipboardPayload, hosting_requested: bool) -> Self {
        Self {
            payload,
            html: payload.html.clone(),
            last_error: None,
            multi_item_rejected: false,
            hosting_requested,
            hosted_images: 0,
        }
    }
}

/// One way of getting the payload onto the clipboard
#[async_trait(?Send)]
pub trait FallbackTier {
    fn kind(&self) -> TierKind;

    async fn attempt(&self, backend: &dyn ClipboardBackend, state: &mut WriteState<'_>) -> AttemptResult;
}

/// HTML item plus one item per image
pub struct MultiItemTier {
    pub config: ClipboardConfig,
}

#[async_trait(?Send)]
impl FallbackTier for MultiItemTier {
    fn kind(&self) -> TierKind {
        TierKind::MultiItem
    }

    async fn attempt(&self, backend: &dyn ClipboardBackend, state: &mut WriteState<'_>) -> AttemptResult {
        if !self.config.attach_image_items {
            return AttemptResult::Skipped("image items disabled".to_string());
        }
        if state.payload.images.is_empty() {
            return AttemptResult::Skipped("no image blobs".to_string());
        }

        let mut items = vec![state.payload.html_item(&state.html)];
        items.extend(
            state
                .payload
                .images
                .iter()
                .cloned()
                .map(super::ClipboardItem::Image),
        );

        match backend.write_items(&items).await {
            Ok(()) => AttemptResult::Succeeded,
            Err(e) => {
                let message = e.to_string();
                if self.config.is_multi_item_rejection(&message) {
                    info!("Clipboard takes a single item only, not retrying multi-item writes");
                    state.multi_item_rejected = true;
                }
                AttemptResult::Failed(message)
            }
        }
    }
}

/// HTML item only
pub struct SingleItemTier;

#[async_trait(?Send)]
impl FallbackTier for SingleItemTier {
    fn kind(&self) -> TierKind {
        TierKind::SingleItem
    }

    async fn attempt(&self, backend: &dyn ClipboardBackend, state: &mut WriteState<'_>) -> AttemptResult {
        let item = state.payload.html_item(&state.html);
        match backend.write_items(std::slice::from_ref(&item)).await {
            Ok(()) => AttemptResult::Succeeded,
            Err(e) => AttemptResult::Failed(e.to_string()),
        }
    }
}

/// Upload embedded images to the image host and retry the single-item write once
pub struct AutoHostTier {
    pub host: Arc<dyn ImageHost>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub token: String,
    pub config: ClipboardConfig,
}

#[async_trait(?Send)]
impl FallbackTier for AutoHostTier {
    fn kind(&self) -> TierKind {
        TierKind::AutoHost
    }

    async fn attempt(&self, backend: &dyn ClipboardBackend, state: &mut WriteState<'_>) -> AttemptResult {
        if state.hosting_requested {
            return AttemptResult::Skipped("images already hosted".to_string());
        }
        let last_error = state.last_error.as_deref().unwrap_or_default();
        if !self.config.auto_host.fires_for(last_error) {
            return AttemptResult::Skipped("auto-host trigger did not fire".to_string());
        }

        let (html, uploaded) =
            match host_embedded_images(&state.html, self.fetcher.as_ref(), self.host.as_ref(), &self.token).await {
                Ok(hosted) => hosted,
                Err(e) => return AttemptResult::Failed(format!("{e:#}")),
            };
        if uploaded == 0 {
            return AttemptResult::Failed("no embedded image could be hosted".to_string());
        }
        debug!("Hosted {uploaded} images, retrying single-item write");

        let item = state.payload.html_item(&html);
        match backend.write_items(std::slice::from_ref(&item)).await {
            Ok(()) => {
                state.html = html;
                state.hosted_images = uploaded;
                AttemptResult::Succeeded
            }
            Err(e) => AttemptResult::Failed(e.to_string()),
        }
    }
}

/// Let the backend render the HTML into an editable surface and copy the selection
pub struct RichPasteTier;

#[async_trait(?Send)]
impl FallbackTier for RichPasteTier {
    fn kind(&self) -> TierKind {
        TierKind::RichPaste
    }

    async fn attempt(&self, backend: &dyn ClipboardBackend, state: &mut WriteState<'_>) -> AttemptResult {
        if backend.copy_rendered(&state.html).await {
            AttemptResult::Succeeded
        } else {
            AttemptResult::Failed("rendered copy was not accepted".to_string())
        }
    }
}

/// Raw HTML as plain text
pub struct PlainTextTier;

#[async_trait(?Send)]
impl FallbackTier for PlainTextTier {
    fn kind(&self) -> TierKind {
        TierKind::PlainText
    }

    async fn attempt(&self, backend: &dyn ClipboardBackend, state: &mut WriteState<'_>) -> AttemptResult {
        match backend.write_text(&state.html).await {
            Ok(()) => AttemptResult::Succeeded,
            Err(e) => AttemptResult::Failed(e.to_string()),
        }
    }
}
