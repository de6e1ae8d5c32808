//! Source fetching.

use crate::models::{IngestConfig, PipelineError, Result, SourceKind};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

/// Body and declared type of a fetched source.
#[derive(Debug, Clone, Default)]
pub struct FetchedDocument {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Retrieves a source by URL. Non-success responses are errors.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

/// HTTP GET fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(PipelineError::Network)?;
        Ok(Self { client })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Self::new(config.fetch_timeout_secs, &config.user_agent)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let network_error = |e: reqwest::Error| PipelineError::SourceNetwork {
            source_id: url.to_string(),
            source: e,
        };

        let response = self.client.get(url).send().await.map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::SourceFetch {
                source_id: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(network_error)?.to_vec();

        debug!(
            url = %url,
            content_type = content_type.as_deref().unwrap_or("-"),
            bytes = bytes.len(),
            "Fetched source"
        );

        Ok(FetchedDocument {
            content_type,
            bytes,
        })
    }
}

/// Decide how to read a fetched link from its content type and URL suffix.
pub fn classify_link(url: &str, content_type: Option<&str>) -> SourceKind {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let path = reqwest::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());

    if content_type.contains("application/pdf") || path.ends_with(".pdf") {
        SourceKind::LinkPdf
    } else if content_type.contains("text/html")
        || content_type.contains("application/xhtml")
        || path.ends_with(".html")
        || path.ends_with(".htm")
    {
        SourceKind::LinkHtml
    } else {
        SourceKind::LinkText
    }
}
