//! Fetch results and per-source failure tracking

/// What a source is being fetched for; selects timeouts and size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Font,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResourceType::Image => "Image",
            ResourceType::Font => "Font",
        })
    }
}

/// Bytes of one fetched resource and their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// A source that kept its original URL because fetching it failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InliningError {
    pub url: String,
    pub resource_type: ResourceType,
    pub error: String,
}

/// Outcome of one inlining pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InliningResult {
    /// Sources replaced by data URIs
    pub successes: usize,
    /// Fetched but over the inline size limit, original URL kept
    pub kept_external: usize,
    pub failures: Vec<InliningError>,
}

impl InliningResult {
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes + self.kept_external + self.failures.len()
    }
}
