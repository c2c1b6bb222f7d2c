//! Test utilities and helper functions for the mp_export test suite

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use mockito::{Mock, Server};
use mp_export::clipboard::{ClipboardBackend, ClipboardError, ClipboardItem};
use mp_export::formula::FnRenderer;
use mp_export::pipeline::{CopyStatus, Notice, StatusSink};
use mp_export::{FormulaEncoding, FormulaError};
use tempfile::TempDir;

/// Creates a temporary directory for test output
#[allow(dead_code)]
pub fn create_test_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Wraps `body` the way the preview renders it: a wrapper holding the content section
#[allow(dead_code)]
pub fn create_preview_html(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>preview</title></head>
<body><div class="markdown-preview-view"><section class="mp-content-section">{body}</section></div></body>
</html>"#
    )
}

/// A small valid PNG
#[allow(dead_code)]
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode test PNG");
    bytes
}

/// Creates a mock endpoint that serves an image
#[allow(dead_code)]
pub async fn create_image_mock(server: &mut Server, path: &str, bytes: Vec<u8>) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(bytes)
        .create_async()
        .await
}

/// Creates a mock endpoint that returns an error
#[allow(dead_code)]
pub async fn create_error_mock(server: &mut Server, path: &str, status: usize) -> Mock {
    server
        .mock("GET", path)
        .with_status(status)
        .with_body("Error")
        .create_async()
        .await
}

/// Helper to create test URLs
#[allow(dead_code)]
pub fn test_url(server: &Server, path: &str) -> String {
    format!("{}{}", server.url(), path)
}

/// Renderer that answers every formula with the same small SVG
#[allow(dead_code)]
pub fn svg_renderer()
-> FnRenderer<impl Fn(&str, FormulaEncoding, bool) -> Result<String, FormulaError> + Send + Sync> {
    FnRenderer(|_source: &str, _encoding: FormulaEncoding, _display: bool| {
        Ok(r#"<svg width="20" height="10" viewBox="0 0 20 10"><rect width="20" height="10"/></svg>"#.to_string())
    })
}

/// Clipboard that records writes and can refuse multi-item writes
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingClipboard {
    pub single_item_only: bool,
    pub refuse_items: bool,
    pub item_writes: Mutex<Vec<Vec<ClipboardItem>>>,
    pub texts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingClipboard {
    pub fn single_item_only() -> Arc<Self> {
        Arc::new(Self {
            single_item_only: true,
            ..Self::default()
        })
    }

    /// HTML of the last accepted item write
    pub fn last_html(&self) -> Option<String> {
        let writes = self.item_writes.lock().unwrap();
        writes.last().and_then(|items| {
            items.iter().find_map(|item| match item {
                ClipboardItem::Html { html, .. } => Some(html.clone()),
                ClipboardItem::Image(_) => None,
            })
        })
    }

    pub fn write_sizes(&self) -> Vec<usize> {
        self.item_writes.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl ClipboardBackend for RecordingClipboard {
    async fn write_items(&self, items: &[ClipboardItem]) -> Result<(), ClipboardError> {
        self.item_writes.lock().unwrap().push(items.to_vec());
        if self.refuse_items {
            return Err(ClipboardError::Write("clipboard is locked".into()));
        }
        if self.single_item_only && items.len() > 1 {
            return Err(ClipboardError::Write(
                "NotAllowedError: Support for multiple ClipboardItems is not implemented.".into(),
            ));
        }
        Ok(())
    }

    async fn copy_rendered(&self, _html: &str) -> bool {
        false
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Status sink that keeps everything it is told
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingStatus {
    pub statuses: Mutex<Vec<CopyStatus>>,
    pub notices: Mutex<Vec<Notice>>,
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, status: CopyStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
