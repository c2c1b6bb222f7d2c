//! `<img>` source inlining

use futures::future::join_all;
use kuchiki::NodeRef;
use log::{debug, info, warn};

use super::fetcher::ResourceFetcher;
use super::types::{InliningError, InliningResult, ResourceType};
use crate::config::InlineConfig;
use crate::utils::{data_uri, dom};

/// Replace every non-`data:` `<img src>` under `root` with a data URI
///
/// Images are fetched concurrently. A failed fetch is logged and recorded and
/// leaves the original source; images over `max_inline_size_bytes` keep
/// their URL as well.
pub async fn inline_images(
    root: &NodeRef,
    fetcher: &dyn ResourceFetcher,
    config: &InlineConfig,
) -> InliningResult {
    let images: Vec<(NodeRef, String)> = match root.select("img") {
        Ok(found) => found
            .filter_map(|img| {
                let node = img.as_node().clone();
                let src = dom::attr(&node, "src")?;
                let src = src.trim().to_string();
                (!src.is_empty() && !src.to_ascii_lowercase().starts_with("data:"))
                    .then_some((node, src))
            })
            .collect(),
        Err(()) => Vec::new(),
    };

    let mut result = InliningResult::default();
    if images.is_empty() {
        return result;
    }

    let downloads = join_all(
        images
            .iter()
            .map(|(_, src)| fetcher.fetch(src, ResourceType::Image)),
    )
    .await;

    for ((node, src), download) in images.iter().zip(downloads) {
        match download {
            Ok(resource) => {
                if let Some(max_size) = config.max_inline_size_bytes
                    && resource.bytes.len() > max_size
                {
                    debug!(
                        "Image size ({} bytes) exceeds max_inline_size_bytes ({max_size} bytes), keeping as external URL: {src}",
                        resource.bytes.len()
                    );
                    result.kept_external += 1;
                    continue;
                }
                dom::set_attr(node, "src", data_uri::encode(&resource.mime, &resource.bytes));
                result.successes += 1;
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!("Failed to inline image from {src}: {error}");
                result.failures.push(InliningError {
                    url: src.clone(),
                    resource_type: ResourceType::Image,
                    error,
                });
            }
        }
    }

    info!(
        "Inlined {} of {} images ({} kept external, {} failed)",
        result.successes,
        result.total(),
        result.kept_external,
        result.failures.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline_resources::FetchedResource;
    use async_trait::async_trait;

    struct MapFetcher;

    #[async_trait]
    impl ResourceFetcher for MapFetcher {
        async fn fetch(
            &self,
            url: &str,
            _resource_type: ResourceType,
        ) -> anyhow::Result<FetchedResource> {
            match url {
                "small.png" => Ok(FetchedResource {
                    bytes: vec![1, 2, 3],
                    mime: "image/png".into(),
                }),
                "large.png" => Ok(FetchedResource {
                    bytes: vec![0; 64],
                    mime: "image/png".into(),
                }),
                _ => anyhow::bail!("404 for {url}"),
            }
        }
    }

    #[tokio::test]
    async fn test_inlines_skips_and_records_failures() {
        let root = dom::parse_root_element(
            r#"<div><img src="small.png"><img src="large.png"><img src="missing.png"><img src="data:image/png;base64,AA=="></div>"#,
        )
        .unwrap();
        let config = InlineConfig {
            max_inline_size_bytes: Some(16),
            ..InlineConfig::default()
        };

        let result = inline_images(&root, &MapFetcher, &config).await;

        assert_eq!(result.successes, 1);
        assert_eq!(result.kept_external, 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].url, "missing.png");

        let srcs: Vec<String> = root
            .select("img")
            .unwrap()
            .map(|img| dom::attr(img.as_node(), "src").unwrap())
            .collect();
        assert_eq!(
            srcs,
            vec![
                "data:image/png;base64,AQID",
                "large.png",
                "missing.png",
                "data:image/png;base64,AA==",
            ]
        );
    }
}
