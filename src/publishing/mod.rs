//! External publishing: image host upload and vault persistence
//!
//! Both collaborators are optional. Images the host takes are referenced by
//! their hosted URL; images still embedded afterwards are saved into the
//! configured vault folder and referenced by a vault-relative locator.

pub mod host;
pub mod store;

use futures::future::join_all;
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;
use log::{debug, info, warn};

use crate::config::PublishConfig;
use crate::inline_resources::{ResourceFetcher, ResourceType};
use crate::utils::{data_uri, dom};

pub use host::{HttpImageHost, ImageHost};
pub use store::{LocalStore, VaultStore, content_file_name};

/// Bytes of one image and their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Blob behind a `data:` URI
    #[must_use]
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        data_uri::decode(uri).map(|(mime, bytes)| Self { bytes, mime })
    }
}

/// One `<img>` of the export payload
#[derive(Debug)]
pub struct ImageReference {
    node: NodeRef,
    src: String,
    blob: Option<ImageBlob>,
}

impl ImageReference {
    pub fn new(node: NodeRef, src: impl Into<String>) -> Self {
        Self {
            node,
            src: src.into(),
            blob: None,
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Still carried inside the document rather than referenced remotely
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        let src = self.src.to_ascii_lowercase();
        src.starts_with("data:") || src.starts_with("blob:")
    }

    pub fn blob(&self) -> Option<&ImageBlob> {
        self.blob.as_ref()
    }

    /// Obtain the bytes once; later calls reuse them
    pub async fn load_blob(&mut self, fetcher: &dyn ResourceFetcher) -> bool {
        if self.blob.is_some() {
            return true;
        }
        self.blob = match ImageBlob::from_data_uri(&self.src) {
            Some(blob) => Some(blob),
            None => match fetcher.fetch(&self.src, ResourceType::Image).await {
                Ok(fetched) => Some(ImageBlob::new(fetched.bytes, fetched.mime)),
                Err(e) => {
                    warn!("Failed to read image {}: {e:#}", preview_src(&self.src));
                    None
                }
            },
        };
        self.blob.is_some()
    }

    /// Point the `<img>` at a new location
    pub fn rewrite(&mut self, src: impl Into<String>) {
        self.src = src.into();
        dom::set_attr(&self.node, "src", self.src.clone());
    }
}

/// Every `<img>` with a non-empty source, in document order
#[must_use]
pub fn collect_image_references(root: &NodeRef) -> Vec<ImageReference> {
    match root.select("img") {
        Ok(images) => images
            .filter_map(|img| {
                let node = img.as_node().clone();
                let src = dom::attr(&node, "src")?;
                (!src.trim().is_empty()).then(|| ImageReference::new(node, src.trim()))
            })
            .collect(),
        Err(()) => Vec::new(),
    }
}

/// What publishing did to the payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub uploaded: usize,
    pub saved: usize,
    /// Sources that could not be read, uploaded or saved
    pub failures: Vec<String>,
}

impl PublishSummary {
    #[must_use]
    pub fn rewritten(&self) -> usize {
        self.uploaded + self.saved
    }
}

/// Upload to the host (when requested) and save the rest into the vault
pub async fn publish_images(
    root: &NodeRef,
    fetcher: &dyn ResourceFetcher,
    host: Option<&dyn ImageHost>,
    store: Option<&dyn LocalStore>,
    config: &PublishConfig,
) -> PublishSummary {
    let mut references = collect_image_references(root);
    let mut summary = PublishSummary::default();
    if references.is_empty() {
        return summary;
    }

    if config.upload_images {
        match host {
            Some(host) => {
                let token = config.auth_token.as_deref().unwrap_or_default();
                let (uploaded, failures) =
                    upload_references(&mut references, fetcher, host, token, |_| true).await;
                summary.uploaded = uploaded;
                summary.failures.extend(failures);
            }
            None => warn!("Image upload requested but no image host is configured"),
        }
    }

    if let (Some(store), Some(folder)) = (store, config.save_folder.as_deref()) {
        let mut pending: Vec<&mut ImageReference> =
            references.iter_mut().filter(|r| r.is_embedded()).collect();
        join_all(pending.iter_mut().map(|r| r.load_blob(fetcher))).await;

        let locators = join_all(pending.iter().map(|r| async move {
            match r.blob() {
                Some(blob) => store.save(folder, blob).await,
                None => None,
            }
        }))
        .await;

        for (reference, locator) in pending.into_iter().zip(locators) {
            match locator {
                Some(locator) => {
                    reference.rewrite(locator);
                    summary.saved += 1;
                }
                None => summary.failures.push(preview_src(reference.src())),
            }
        }
    }

    info!(
        "Published images: {} uploaded, {} saved, {} failed",
        summary.uploaded,
        summary.saved,
        summary.failures.len()
    );
    summary
}

/// Upload the references selected by `wanted`, rewriting the ones the host took
///
/// Returns the number uploaded and the sources that failed.
async fn upload_references(
    references: &mut [ImageReference],
    fetcher: &dyn ResourceFetcher,
    host: &dyn ImageHost,
    token: &str,
    wanted: impl Fn(&ImageReference) -> bool,
) -> (usize, Vec<String>) {
    let mut selected: Vec<&mut ImageReference> =
        references.iter_mut().filter(|r| wanted(&**r)).collect();
    join_all(selected.iter_mut().map(|r| r.load_blob(fetcher))).await;

    let uploads = join_all(selected.iter().map(|r| async move {
        match r.blob() {
            Some(blob) => host.upload(blob, token).await,
            None => None,
        }
    }))
    .await;

    let mut uploaded = 0;
    let mut failures = Vec::new();
    for (reference, url) in selected.into_iter().zip(uploads) {
        match url {
            Some(url) => {
                debug!("Image {} hosted at {url}", preview_src(reference.src()));
                reference.rewrite(url);
                uploaded += 1;
            }
            None => failures.push(preview_src(reference.src())),
        }
    }
    (uploaded, failures)
}

/// Host every embedded image of an HTML fragment and rewrite its sources
///
/// Returns the rewritten HTML and how many images the host took.
pub async fn host_embedded_images(
    html: &str,
    fetcher: &dyn ResourceFetcher,
    host: &dyn ImageHost,
    token: &str,
) -> anyhow::Result<(String, usize)> {
    let document = kuchiki::parse_html().one(html);
    let body = document
        .select_first("body")
        .map_err(|()| anyhow::anyhow!("HTML fragment has no body"))?;
    let body = body.as_node().clone();

    let mut references = collect_image_references(&body);
    let (uploaded, failures) =
        upload_references(&mut references, fetcher, host, token, ImageReference::is_embedded).await;
    if !failures.is_empty() {
        warn!("{} embedded images could not be hosted", failures.len());
    }
    Ok((dom::inner_html(&body)?, uploaded))
}

/// Short form of a source for logs; data URIs are long
fn preview_src(src: &str) -> String {
    crate::utils::string_utils::preview_for_log(src, 64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline_resources::FetchedResource;
    use async_trait::async_trait;

    struct NoFetch;

    #[async_trait]
    impl ResourceFetcher for NoFetch {
        async fn fetch(&self, url: &str, _: ResourceType) -> anyhow::Result<FetchedResource> {
            anyhow::bail!("offline: {url}")
        }
    }

    struct CountingHost;

    #[async_trait]
    impl ImageHost for CountingHost {
        async fn upload(&self, blob: &ImageBlob, token: &str) -> Option<String> {
            (token == "t").then(|| format!("https://img.example.com/{}.png", blob.bytes.len()))
        }
    }

    #[test]
    fn test_embedded_detection() {
        let img = dom::parse_element(r#"<img src="data:image/png;base64,AA==">"#, "img").unwrap();
        assert!(ImageReference::new(img.clone(), "data:image/png;base64,AA==").is_embedded());
        assert!(ImageReference::new(img.clone(), "blob:app://x/1").is_embedded());
        assert!(!ImageReference::new(img, "https://a/b.png").is_embedded());
    }

    #[tokio::test]
    async fn test_host_embedded_images_rewrites_only_embedded() {
        let html = r#"<p><img src="data:image/png;base64,AQID"><img src="https://keep.example.com/x.png"></p>"#;
        let (rewritten, uploaded) = host_embedded_images(html, &NoFetch, &CountingHost, "t")
            .await
            .unwrap();
        assert_eq!(uploaded, 1);
        assert!(rewritten.contains(r#"src="https://img.example.com/3.png""#));
        assert!(rewritten.contains(r#"src="https://keep.example.com/x.png""#));
    }

    #[tokio::test]
    async fn test_publish_without_collaborators_is_a_no_op() {
        let root = dom::parse_root_element(r#"<div><img src="data:image/png;base64,AQID"></div>"#).unwrap();
        let summary = publish_images(&root, &NoFetch, None, None, &PublishConfig::default()).await;
        assert_eq!(summary, PublishSummary::default());
    }
}
