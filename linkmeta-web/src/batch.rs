//! Bounded concurrent extraction over many URLs.

use futures::StreamExt;
use futures::stream;
use linkmeta_http::PageFetcher;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{MetadataService, PageMetadataError};
use crate::result::MetadataResult;

/// Outcome for one URL of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub url: String,
    pub result: Result<MetadataResult, PageMetadataError>,
}

/// Run the pipeline for every URL with at most `concurrency` calls in flight.
///
/// Outcomes come back in input order. Firing `cancel` aborts in-flight
/// fetches and fails the remaining URLs as cancelled without contacting them.
pub async fn extract_many<F, I>(
    service: &MetadataService<F>,
    urls: I,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<BatchOutcome>
where
    F: PageFetcher,
    I: IntoIterator<Item = String>,
{
    let concurrency = concurrency.max(1);
    tracing::debug!(concurrency, "batch.start");

    let outcomes: Vec<BatchOutcome> = stream::iter(urls)
        .map(move |url| async move {
            let result = service
                .extract_page_metadata_with_cancel(&url, cancel)
                .await;
            BatchOutcome { url, result }
        })
        .buffered(concurrency)
        .collect()
        .await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    tracing::info!(
        total = outcomes.len(),
        failed,
        cancelled = cancel.is_cancelled(),
        "batch.done"
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Extractor;
    use async_trait::async_trait;
    use linkmeta_http::{FetchError, FetchedDocument};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the URL path into a `<title>`, tracking peak concurrency.
    #[derive(Default)]
    struct EchoFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for EchoFetcher {
        async fn fetch_page(
            &self,
            url: &str,
            cancel: &CancellationToken,
        ) -> Result<FetchedDocument, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
                _ = tokio::time::sleep(Duration::from_millis(20)) => {
                    let title = url.rsplit('/').next().unwrap_or_default().to_string();
                    Ok(FetchedDocument::from_bytes(url, format!("<title>{title}</title>")))
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }

    #[tokio::test]
    async fn keeps_input_order_and_bounds_concurrency() {
        let service = MetadataService::new(EchoFetcher::default(), Extractor::default());
        let urls: Vec<String> = (0..10)
            .map(|i| format!("https://example.com/page-{i}"))
            .collect();

        let outcomes = extract_many(&service, urls.clone(), 3, &CancellationToken::new()).await;

        assert_eq!(outcomes.len(), 10);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.url, urls[i]);
            let meta = outcome.result.as_ref().unwrap();
            assert_eq!(meta.title, format!("page-{i}"));
        }
        let peak = service.fetcher().peak.load(Ordering::SeqCst);
        assert!(peak <= 3 && peak > 1, "peak concurrency was {peak}");
    }

    #[tokio::test]
    async fn one_bad_url_does_not_sink_the_batch() {
        let service = MetadataService::new(EchoFetcher::default(), Extractor::default());
        let urls = vec![
            "https://example.com/ok".to_string(),
            String::new(),
            "https://example.com/also-ok".to_string(),
        ];
        let outcomes = extract_many(&service, urls, 2, &CancellationToken::new()).await;
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(PageMetadataError::Validation(_))
        ));
        assert!(outcomes[2].result.is_ok());
    }

    #[tokio::test]
    async fn cancelled_batch_fails_every_fetch() {
        let service = MetadataService::new(EchoFetcher::default(), Extractor::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let urls = (0..4).map(|i| format!("https://example.com/{i}"));
        let outcomes = extract_many(&service, urls, 2, &cancel).await;
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| matches!(
            o.result,
            Err(PageMetadataError::Fetch(FetchError::Cancelled { .. }))
        )));
    }
}
