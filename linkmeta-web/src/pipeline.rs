//! URL in, [`MetadataResult`] or a single error out.

use linkmeta_http::{FetchError, HttpFetcher, PageFetcher};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::document::ParseError;
use crate::extract::Extractor;
use crate::result::MetadataResult;

/// The caller's URL was unusable; raised before any network activity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no URL provided")]
    Empty,
    #[error("malformed URL {url:?}: {reason}")]
    Malformed { url: String, reason: String },
}

/// Every way a metadata call can fail. Missing fields are not among them.
#[derive(Debug, Error)]
pub enum PageMetadataError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A validated request: non-empty, absolute `http`/`https`, with a host.
///
/// ```
/// use linkmeta_web::{ExtractionRequest, ValidationError};
///
/// let req = ExtractionRequest::new("https://example.com/a/?b=1").unwrap();
/// assert_eq!(req.url(), "https://example.com/a/?b=1");
///
/// assert_eq!(ExtractionRequest::new("  ").unwrap_err(), ValidationError::Empty);
/// assert!(ExtractionRequest::new("example.com/no-scheme").is_err());
/// assert!(ExtractionRequest::new("ftp://example.com/file").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    url: String,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>) -> Result<Self, ValidationError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        let parsed = Url::parse(&url).map_err(|e| ValidationError::Malformed {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::Malformed {
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
                url,
            });
        }
        if !parsed.has_host() {
            return Err(ValidationError::Malformed {
                url,
                reason: "URL has no host".into(),
            });
        }
        Ok(Self { url })
    }

    /// The URL exactly as the caller supplied it.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Fetch + extract, bound to one fetcher and one extractor.
///
/// Holds no per-call state, so a single service can be shared (behind an
/// `Arc` or a reference) by any number of concurrent calls.
pub struct MetadataService<F = HttpFetcher> {
    fetcher: F,
    extractor: Extractor,
}

impl MetadataService<HttpFetcher> {
    /// Service over a default [`HttpFetcher`] and the standard extractor.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Ok(Self::new(HttpFetcher::new()?, Extractor::default()))
    }
}

impl<F: PageFetcher> MetadataService<F> {
    pub fn new(fetcher: F, extractor: Extractor) -> Self {
        Self { fetcher, extractor }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub async fn extract_page_metadata(
        &self,
        url: &str,
    ) -> Result<MetadataResult, PageMetadataError> {
        self.extract_page_metadata_with_cancel(url, &CancellationToken::new())
            .await
    }

    /// Validate, fetch (abortable through `cancel`), then extract.
    pub async fn extract_page_metadata_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<MetadataResult, PageMetadataError> {
        let request = ExtractionRequest::new(url).inspect_err(|e| {
            tracing::debug!(url = %url, error = %e, "pipeline.validation_error");
        })?;

        let doc = self.fetcher.fetch_page(request.url(), cancel).await?;
        let result = self.extractor.extract_as(request.url(), &doc)?;

        tracing::info!(
            url = %request.url(),
            resolved = result.resolved_count(),
            "pipeline.extracted"
        );
        Ok(result)
    }
}

/// One-shot convenience over a default [`MetadataService`].
///
/// Builds a fresh HTTP client per call; reuse a [`MetadataService`] when
/// extracting many pages.
pub async fn extract_page_metadata(url: &str) -> Result<MetadataResult, PageMetadataError> {
    let request = ExtractionRequest::new(url)?;
    MetadataService::with_defaults()?
        .extract_page_metadata(request.url())
        .await
}
