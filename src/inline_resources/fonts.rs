//! `@font-face` source inlining

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, warn};

use super::fetcher::ResourceFetcher;
use super::types::{InliningError, InliningResult, ResourceType};
use crate::utils::css::{self, FontFaceRule};
use crate::utils::data_uri;
use crate::utils::url_utils::resolve_url;

/// Replace the `url(...)` sources of `@font-face` rules with data URIs
///
/// Relative font URLs are resolved against `base_url` when one is given.
/// Rules whose fonts cannot be fetched keep their original reference.
pub async fn inline_font_faces(
    rules: &[FontFaceRule],
    fetcher: &dyn ResourceFetcher,
    base_url: Option<&str>,
) -> (Vec<FontFaceRule>, InliningResult) {
    let mut references: Vec<(usize, String, String)> = Vec::new();
    for (index, rule) in rules.iter().enumerate() {
        for reference in css::url_references(&rule.css_text) {
            if reference.starts_with("data:") {
                continue;
            }
            let target = match base_url {
                Some(base) => resolve_url(base, &reference).unwrap_or_else(|_| reference.clone()),
                None => reference.clone(),
            };
            references.push((index, reference, target));
        }
    }

    let downloads = join_all(
        references
            .iter()
            .map(|(_, _, target)| fetcher.fetch(target, ResourceType::Font)),
    )
    .await;

    let mut inlined: Vec<FontFaceRule> = rules.to_vec();
    let mut result = InliningResult::default();

    for ((index, reference, target), download) in references.iter().zip(downloads) {
        match download {
            Ok(resource) => {
                let uri = data_uri::encode(&resource.mime, &resource.bytes);
                let rule = &mut inlined[*index];
                rule.css_text = replace_url(&rule.css_text, reference, &uri);
                result.successes += 1;
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!("Failed to inline font {target}: {error}");
                result.failures.push(InliningError {
                    url: target.clone(),
                    resource_type: ResourceType::Font,
                    error,
                });
            }
        }
    }

    (inlined, result)
}

/// Per-export store of `@font-face` rules, inlined on first use
///
/// A rule's fonts are fetched the first time a rasterized node uses its
/// family and reused for every later node. Exports that never synthesize a
/// raster wrapper fetch nothing.
#[derive(Default)]
pub struct FontFaceCache {
    rules: Vec<FontFaceRule>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    base_url: Option<String>,
    inlined: RefCell<HashMap<usize, FontFaceRule>>,
    result: RefCell<InliningResult>,
}

impl FontFaceCache {
    pub fn new(
        rules: Vec<FontFaceRule>,
        fetcher: Arc<dyn ResourceFetcher>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            rules,
            fetcher: Some(fetcher),
            base_url,
            ..Self::default()
        }
    }

    /// Inlined rules for `families`, fetching rules not seen before
    pub async fn faces_for(&self, families: &HashSet<String>) -> Vec<FontFaceRule> {
        let wanted: Vec<usize> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| families.contains(&rule.family))
            .map(|(index, _)| index)
            .collect();
        let Some(fetcher) = self.fetcher.as_deref() else {
            return wanted.iter().map(|&index| self.rules[index].clone()).collect();
        };

        let missing: Vec<usize> = {
            let inlined = self.inlined.borrow();
            wanted.iter().copied().filter(|index| !inlined.contains_key(index)).collect()
        };
        if !missing.is_empty() {
            debug!("Inlining {} font face rules on first use", missing.len());
            let pending: Vec<FontFaceRule> =
                missing.iter().map(|&index| self.rules[index].clone()).collect();
            let (done, result) = inline_font_faces(&pending, fetcher, self.base_url.as_deref()).await;

            self.inlined.borrow_mut().extend(missing.into_iter().zip(done));
            let mut total = self.result.borrow_mut();
            total.successes += result.successes;
            total.kept_external += result.kept_external;
            total.failures.extend(result.failures);
        }

        let inlined = self.inlined.borrow();
        wanted.iter().filter_map(|index| inlined.get(index).cloned()).collect()
    }

    /// Fetch outcomes so far
    #[must_use]
    pub fn result(&self) -> InliningResult {
        self.result.borrow().clone()
    }
}

/// Rewrite `url(reference)` in any quoting style to `url("replacement")`
fn replace_url(css_text: &str, reference: &str, replacement: &str) -> String {
    let quoted = format!("url(\"{replacement}\")");
    [
        format!("url(\"{reference}\")"),
        format!("url('{reference}')"),
        format!("url({reference})"),
    ]
    .iter()
    .fold(css_text.to_string(), |text, form| text.replace(form, &quoted))
}
