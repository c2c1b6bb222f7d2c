//! System clipboard backend
//!
//! Desktop clipboards hold a single item with several representations. A
//! multi-item payload is flattened into one `set` call carrying the HTML, its
//! plain text and an image representation; only a failure reported by the
//! platform sends the writer on to the next tier.

use async_trait::async_trait;
use clipboard_rs::{Clipboard, ClipboardContent, ClipboardContext, RustImageData};
use clipboard_rs::common::RustImage;
use kuchiki::traits::TendrilSink;
use log::{debug, warn};

use super::ClipboardBackend;
use super::types::{ClipboardError, ClipboardItem};

/// Backend over `clipboard-rs`, with `arboard` for rich paste
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

fn open_context() -> Result<ClipboardContext, ClipboardError> {
    ClipboardContext::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))
}

/// Representations for one clipboard write
///
/// The clipboard keeps one image per write, so only the first decodable
/// image item is attached. The HTML still embeds every image.
fn clipboard_contents(items: &[ClipboardItem]) -> Result<Vec<ClipboardContent>, ClipboardError> {
    let mut contents = Vec::with_capacity(3);
    let mut image_attached = false;

    for item in items {
        match item {
            ClipboardItem::Html { html, plain_text } => {
                contents.push(ClipboardContent::Html(html.clone()));
                contents.push(ClipboardContent::Text(plain_text.clone()));
            }
            ClipboardItem::Image(_) if image_attached => {
                debug!("Clipboard holds one image, extra image item left to the HTML");
            }
            ClipboardItem::Image(blob) => match RustImageData::from_bytes(&blob.bytes) {
                Ok(image) => {
                    contents.push(ClipboardContent::Image(image));
                    image_attached = true;
                }
                Err(e) if items.len() == 1 => {
                    return Err(ClipboardError::Write(format!(
                        "unreadable {} image: {e}",
                        blob.mime
                    )));
                }
                Err(e) => warn!("Skipping unreadable {} image item: {e}", blob.mime),
            },
        }
    }

    if contents.is_empty() {
        return Err(ClipboardError::Write("nothing to write".to_string()));
    }
    Ok(contents)
}

fn write_contents(contents: Vec<ClipboardContent>) -> Result<(), ClipboardError> {
    open_context()?
        .set(contents)
        .map_err(|e| ClipboardError::Write(e.to_string()))
}

/// Run blocking clipboard work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T, ClipboardError>
where
    F: FnOnce() -> Result<T, ClipboardError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ClipboardError::Write(format!("clipboard task failed: {e}")))?
}

/// Visible text of an HTML fragment
fn text_of(html: &str) -> String {
    kuchiki::parse_html().one(html).text_contents()
}

#[async_trait]
impl ClipboardBackend for SystemClipboard {
    async fn write_items(&self, items: &[ClipboardItem]) -> Result<(), ClipboardError> {
        let contents = clipboard_contents(items)?;
        debug!("Writing {} clipboard representations", contents.len());
        blocking(move || write_contents(contents)).await
    }

    async fn copy_rendered(&self, html: &str) -> bool {
        let html = html.to_string();
        let result = blocking(move || {
            let alt_text = text_of(&html);
            let mut clipboard =
                arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            clipboard
                .set_html(html, Some(alt_text))
                .map_err(|e| ClipboardError::Write(e.to_string()))
        })
        .await;
        if let Err(e) = &result {
            debug!("Rich paste emulation failed: {e}");
        }
        result.is_ok()
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let text = text.to_string();
        blocking(move || {
            open_context()?
                .set_text(text)
                .map_err(|e| ClipboardError::Write(e.to_string()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publishing::ImageBlob;

    fn png() -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::new_rgba8(2, 2)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn html_item() -> ClipboardItem {
        ClipboardItem::Html {
            html: "<p>a</p>".into(),
            plain_text: "a".into(),
        }
    }

    #[test]
    fn test_multi_item_payload_becomes_one_write() {
        let items = vec![
            html_item(),
            ClipboardItem::Image(ImageBlob::new(png(), "image/png")),
            ClipboardItem::Image(ImageBlob::new(png(), "image/png")),
        ];
        let contents = clipboard_contents(&items).unwrap();

        assert_eq!(contents.len(), 3);
        assert!(matches!(&contents[0], ClipboardContent::Html(html) if html == "<p>a</p>"));
        assert!(matches!(&contents[1], ClipboardContent::Text(text) if text == "a"));
        assert!(matches!(&contents[2], ClipboardContent::Image(_)));
    }

    #[test]
    fn test_unreadable_image_item_does_not_block_the_html() {
        let items = vec![html_item(), ClipboardItem::Image(ImageBlob::new(vec![1], "image/png"))];
        assert_eq!(clipboard_contents(&items).unwrap().len(), 2);

        let alone = [ClipboardItem::Image(ImageBlob::new(vec![1], "image/png"))];
        assert!(matches!(clipboard_contents(&alone), Err(ClipboardError::Write(_))));
        assert!(clipboard_contents(&[]).is_err());
    }

    #[test]
    fn test_text_of_fragment() {
        assert_eq!(text_of("<p>a <b>b</b></p>"), "a b");
    }
}
