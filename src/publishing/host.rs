//! External image host upload

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::ImageBlob;
use crate::config::PublishConfig;
use crate::utils::constants::CHROME_USER_AGENT;

/// Uploads an image and answers with its public URL
///
/// Implementations never error: any failure is logged and reported as `None`.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, blob: &ImageBlob, token: &str) -> Option<String>;
}

/// Image host reached with a single authenticated POST of the raw bytes
#[derive(Debug, Clone)]
pub struct HttpImageHost {
    client: Client,
    endpoint: String,
    auth_schemes: Vec<String>,
    timeout: std::time::Duration,
}

impl HttpImageHost {
    pub fn new(endpoint: impl Into<String>, config: &PublishConfig) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(CHROME_USER_AGENT).build()?;
        Ok(Self::with_client(client, endpoint, config))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>, config: &PublishConfig) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            auth_schemes: config.auth_schemes.clone(),
            timeout: config.upload_timeout(),
        }
    }

    /// Host configured by `publish.host_endpoint`, if any
    pub fn from_config(config: &PublishConfig) -> anyhow::Result<Option<Self>> {
        config
            .host_endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, config))
            .transpose()
    }

    /// One POST with the given `Authorization` header value
    async fn post(&self, blob: &ImageBlob, authorization: Option<&str>) -> reqwest::Result<reqwest::Response> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header("Content-Type", blob.mime.as_str())
            .body(blob.bytes.clone());
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await
    }
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn upload(&self, blob: &ImageBlob, token: &str) -> Option<String> {
        let authorizations: Vec<Option<String>> = if token.is_empty() {
            vec![None]
        } else {
            self.auth_schemes
                .iter()
                .map(|scheme| Some(scheme.replace("{token}", token)))
                .collect()
        };

        for (attempt, authorization) in authorizations.iter().enumerate() {
            let response = match self.post(blob, authorization.as_deref()).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Image upload to {} failed: {e}", self.endpoint);
                    return None;
                }
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                debug!(
                    "Image host rejected authorization format {} of {} with {status}",
                    attempt + 1,
                    authorizations.len()
                );
                continue;
            }
            if !status.is_success() {
                warn!("Image upload to {} failed with status: {status}", self.endpoint);
                return None;
            }

            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Image host answered with unreadable JSON: {e}");
                    return None;
                }
            };
            let url = hosted_url(&body);
            match &url {
                Some(url) => info!("Uploaded {} bytes to {url}", blob.bytes.len()),
                None => warn!("Image host response carries no URL: {body}"),
            }
            return url;
        }

        warn!(
            "Image host refused every authorization format ({} tried)",
            authorizations.len()
        );
        None
    }
}

/// Hosted URL from the common response shapes
fn hosted_url(body: &Value) -> Option<String> {
    ["/url", "/data/url", "/data/link", "/link"]
        .iter()
        .find_map(|pointer| body.pointer(pointer).and_then(Value::as_str))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}
