//! Resource fetching from the network and the local vault
//!
//! `HttpFetcher` handles every source kind an export meets: remote URLs with
//! streaming size checks, `file://` URLs, absolute paths and Obsidian `app://`
//! resource URLs on disk, relative sources resolved against a base URL, and
//! `data:` URIs decoded in place.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use super::types::{FetchedResource, ResourceType};
use crate::config::InlineConfig;
use crate::utils::constants::CHROME_USER_AGENT;
use crate::utils::data_uri;
use crate::utils::url_utils::{SourceKind, classify_source, mime_from_extension, resolve_url};

/// Loads the bytes behind a resource URL
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str, resource_type: ResourceType) -> Result<FetchedResource>;
}

/// Fetcher over HTTP and the local file system
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: InlineConfig,
}

impl HttpFetcher {
    pub fn new(config: InlineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(CHROME_USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: Client, config: InlineConfig) -> Self {
        Self { client, config }
    }

    fn limits(&self, resource_type: ResourceType) -> (std::time::Duration, usize) {
        match resource_type {
            ResourceType::Image => (self.config.image_timeout(), self.config.max_image_size),
            ResourceType::Font => (self.config.font_timeout(), self.config.max_font_size),
        }
    }

    async fn fetch_remote(&self, url: &str, resource_type: ResourceType) -> Result<FetchedResource> {
        let (timeout, max_size) = self.limits(resource_type);
        let accept = match resource_type {
            ResourceType::Image => "image/avif,image/webp,image/apng,image/*,*/*;q=0.8",
            ResourceType::Font => "font/woff2,font/*;q=0.9,*/*;q=0.8",
        };

        // Download with timeout and browser-like headers
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("User-Agent", CHROME_USER_AGENT)
            .header("Accept", accept)
            .send()
            .await
            .with_context(|| format!("Failed to download {resource_type}"))?;

        if !response.status().is_success() {
            bail!(
                "{resource_type} download failed with status: {}",
                response.status()
            );
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Enforce the limit BEFORE downloading when the size is announced
        let expected_size = response.content_length().unwrap_or(0);
        if expected_size > max_size as u64 {
            bail!(
                "{resource_type} too large: {expected_size} bytes exceeds limit of {max_size} bytes"
            );
        }

        let mut buffer = if expected_size > 0 {
            Vec::with_capacity(expected_size as usize)
        } else {
            Vec::new()
        };

        // Stream response with size checking (second line of defense)
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.with_context(|| format!("Failed to read {resource_type} chunk"))?;
            let new_total = buffer.len() + chunk.len();
            if new_total > max_size {
                bail!(
                    "{resource_type} download exceeded size limit during download: {new_total} bytes (max: {max_size})"
                );
            }
            buffer.extend_from_slice(&chunk);
        }

        let mime = detect_mime(content_type.as_deref(), &buffer, url);
        Ok(FetchedResource {
            bytes: buffer,
            mime,
        })
    }

    async fn fetch_local(
        &self,
        path: &std::path::Path,
        url: &str,
        resource_type: ResourceType,
    ) -> Result<FetchedResource> {
        let (_, max_size) = self.limits(resource_type);
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if metadata.len() > max_size as u64 {
            bail!(
                "{resource_type} too large: {} bytes exceeds limit of {max_size} bytes",
                metadata.len()
            );
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mime = detect_mime(None, &bytes, url);
        Ok(FetchedResource { bytes, mime })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, resource_type: ResourceType) -> Result<FetchedResource> {
        match classify_source(url, self.config.vault_base_path.as_deref()) {
            SourceKind::Data => {
                let (mime, bytes) =
                    data_uri::decode(url).ok_or_else(|| anyhow!("Malformed data URI"))?;
                Ok(FetchedResource { bytes, mime })
            }
            SourceKind::Remote(url) => self.fetch_remote(&url, resource_type).await,
            SourceKind::LocalFile(path) => self.fetch_local(&path, url, resource_type).await,
            SourceKind::Blob => bail!("blob: URLs are only readable inside the preview page"),
            SourceKind::Relative(relative) => {
                // Vault-relative path when no base URL is configured
                if self.config.base_url.is_none()
                    && let Some(vault) = self.config.vault_base_path.as_deref()
                {
                    let path = vault.join(relative.split(['?', '#']).next().unwrap_or(&relative));
                    return self.fetch_local(&path, url, resource_type).await;
                }
                let base = self
                    .config
                    .base_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("Relative source `{relative}` without a base URL"))?;
                let resolved = resolve_url(base, &relative)?;
                match classify_source(&resolved, self.config.vault_base_path.as_deref()) {
                    SourceKind::Remote(url) => self.fetch_remote(&url, resource_type).await,
                    SourceKind::LocalFile(path) => {
                        self.fetch_local(&path, &resolved, resource_type).await
                    }
                    _ => bail!("Unsupported resolved source `{resolved}`"),
                }
            }
        }
    }
}

/// MIME type from the response header, sniffed bytes, then the extension
#[must_use]
pub fn detect_mime(header: Option<&str>, bytes: &[u8], url: &str) -> String {
    let declared = header
        .map(|h| h.split(';').next().unwrap_or(h).trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty() && h != "application/octet-stream" && h != "binary/octet-stream");
    if let Some(mime) = declared {
        return mime;
    }
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    if looks_like_svg(bytes) {
        return "image/svg+xml".to_string();
    }
    mime_from_extension(url)
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_ascii_lowercase();
    head.contains("<svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_detect_mime_prefers_header_then_sniffing() {
        assert_eq!(detect_mime(Some("image/jpeg; q=1"), PNG_HEADER, "a.gif"), "image/jpeg");
        assert_eq!(
            detect_mime(Some("application/octet-stream"), PNG_HEADER, "a.gif"),
            "image/png"
        );
        assert_eq!(detect_mime(None, b"<svg xmlns=\"\"/>", "x"), "image/svg+xml");
        assert_eq!(detect_mime(None, b"wOF2....", "KaTeX_Main.woff2"), "font/woff2");
    }

    #[tokio::test]
    async fn test_fetch_local_file_via_app_url() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("pic one.png");
        std::fs::write(&image, PNG_HEADER).unwrap();

        let fetcher = HttpFetcher::new(InlineConfig::default()).unwrap();
        let url = format!(
            "app://local{}?1700000000",
            urlencoding::encode(&image.display().to_string()).replace("%2F", "/")
        );
        let fetched = fetcher.fetch(&url, ResourceType::Image).await.unwrap();
        assert_eq!(fetched.mime, "image/png");
        assert_eq!(fetched.bytes, PNG_HEADER);
    }

    #[tokio::test]
    async fn test_relative_source_needs_base_url() {
        let fetcher = HttpFetcher::new(InlineConfig::default()).unwrap();
        let err = fetcher
            .fetch("img/a.png", ResourceType::Image)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("without a base URL"));
    }

    #[tokio::test]
    async fn test_remote_size_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(vec![0u8; 2048])
            .create_async()
            .await;

        let config = InlineConfig {
            max_image_size: 1024,
            ..InlineConfig::default()
        };
        let fetcher = HttpFetcher::new(config).unwrap();
        let err = fetcher
            .fetch(&format!("{}/big.png", server.url()), ResourceType::Image)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large") || err.to_string().contains("size limit"));
    }
}
