//! Page fetcher: one bounded HTTP GET per call, with structured failure classes.
//!
//! - [`HttpFetcher`] wraps a pooled `reqwest` client configured from [`FetcherConfig`]
//!   (timeout, connect timeout, user agent, redirect cap)
//! - Every failure is a [`FetchError`] variant carrying the URL and the cause;
//!   non-2xx responses are errors, never documents
//! - No retries: exactly one request goes out per call
//! - Cancellation via `tokio_util::sync::CancellationToken`
//! - Optional *raw* request/response logging via `LINKMETA_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), linkmeta_http::FetchError> {
//! let fetcher = linkmeta_http::HttpFetcher::new()?;
//! let doc = fetcher.fetch("https://example.com/post").await?;
//! println!("{} bytes of {:?}", doc.bytes.len(), doc.content_type);
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated, trace level), final errors,
//! cancellation and (optionally) raw request/response lines (target `http.raw`).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url, redirect};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use reqwest::StatusCode as HttpStatusCode;

/// User agent sent when the config does not override it.
pub const DEFAULT_USER_AGENT: &str = concat!("linkmeta/", env!("CARGO_PKG_VERSION"));

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "LINKMETA_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)
const SNIPPET_MAX: usize = 500;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn next_req_id() -> String {
    format!("r{}", NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed))
}

/// Render a best-effort curl command for repro/debug.
fn make_curl(url: &Url, user_agent: Option<&str>) -> String {
    let mut parts = vec!["curl".to_string(), "-XGET".to_string()];
    if let Some(ua) = user_agent {
        parts.push(format!("-A '{}'", ua.replace('\'', r"'\''")));
    }
    let (host_path, query) = redact_query(url);
    let mut target = format!("{}://{}", url.scheme(), host_path);
    if !query.is_empty() {
        let q = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        target.push('?');
        target.push_str(&q);
    }
    parts.push(format!("'{}'", target));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("set-cookie") || key.eq_ignore_ascii_case("authorization") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

/// Why a fetch produced no document.
///
/// `Network`, `Timeout` and `HttpStatus` are the transport outcomes; the rest
/// cover inputs the client refuses and caller-initiated aborts.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("client build failed: {0}")]
    Build(String),
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    #[error("{phase} timed out after {timeout:?} fetching {url}")]
    Timeout {
        url: String,
        phase: TimeoutPhase,
        /// The limit that fired: `connect_timeout` or the whole-request `timeout`.
        timeout: Duration,
    },
    #[error("server returned {status} for {url}")]
    HttpStatus { url: String, status: StatusCode },
    #[error("fetch of {url} was cancelled")]
    Cancelled { url: String },
}

/// Which configured limit a [`FetchError::Timeout`] hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Request,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Request => "request",
        })
    }
}

impl FetchError {
    /// Numeric status for `HttpStatus`, `None` for every other kind.
    ///
    /// ```
    /// use linkmeta_http::{FetchError, HttpStatusCode};
    ///
    /// let err = FetchError::HttpStatus {
    ///     url: "https://example.com".into(),
    ///     status: HttpStatusCode::SERVICE_UNAVAILABLE,
    /// };
    /// assert_eq!(err.status_code(), Some(503));
    /// ```
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    /// Whether a later attempt could plausibly succeed. Nothing here retries;
    /// callers decide.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::InvalidUrl { .. } | Self::Build(_) | Self::Cancelled { .. } => false,
        }
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn classify(url: &str, config: &FetcherConfig, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        timeout_error(url, config, err.is_connect())
    } else if err.is_builder() {
        FetchError::InvalidUrl {
            url: url.to_string(),
            message: error_chain(&err),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error_chain(&err),
        }
    }
}

// A connect timeout surfaces as both `is_timeout` and `is_connect`.
fn timeout_error(url: &str, config: &FetcherConfig, during_connect: bool) -> FetchError {
    let (phase, timeout) = if during_connect {
        (TimeoutPhase::Connect, config.connect_timeout)
    } else {
        (TimeoutPhase::Request, config.timeout)
    };
    FetchError::Timeout {
        url: url.to_string(),
        phase,
        timeout,
    }
}

// ==============================
// Config & documents
// ==============================

/// Transport knobs for [`HttpFetcher`].
///
/// ```
/// use linkmeta_http::FetcherConfig;
/// use std::time::Duration;
///
/// let cfg = FetcherConfig::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_max_redirects(3);
///
/// assert_eq!(cfg.timeout.as_secs(), 30);
/// assert_eq!(cfg.connect_timeout.as_secs(), 5);
/// assert_eq!(cfg.max_redirects, 3);
/// assert!(cfg.user_agent.is_some());
/// ```
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    /// Bound on the whole request, connect through last body byte.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// `None` (or empty) sends no `User-Agent` header at all.
    pub user_agent: Option<String>,
    /// Redirects the transport follows before failing; `0` disables following.
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            max_redirects: 10,
        }
    }
}

impl FetcherConfig {
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.timeout = dur;
        self
    }

    pub fn with_connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = dur;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_max_redirects(mut self, n: usize) -> Self {
        self.max_redirects = n;
        self
    }
}

/// Raw page as the server sent it.
#[derive(Clone, Debug)]
pub struct FetchedDocument {
    /// Exact response body.
    pub bytes: Bytes,
    /// `Content-Type` header value, if the server sent a readable one.
    pub content_type: Option<String>,
    /// The URL the caller asked for, verbatim.
    pub source_url: String,
    /// Where the transport ended up after redirects.
    pub final_url: String,
}

impl FetchedDocument {
    /// Wrap bytes obtained some other way (files, fixtures, caches upstream).
    ///
    /// ```
    /// use linkmeta_http::FetchedDocument;
    ///
    /// let doc = FetchedDocument::from_bytes("https://example.com/", "<html></html>");
    /// assert_eq!(doc.source_url, doc.final_url);
    /// assert!(doc.content_type.is_none());
    /// ```
    pub fn from_bytes(source_url: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let source_url = source_url.into();
        Self {
            bytes: bytes.into(),
            content_type: None,
            final_url: source_url.clone(),
            source_url,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

// ==============================
// Fetcher seam
// ==============================

/// Anything that can turn a URL into a [`FetchedDocument`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, giving up with [`FetchError::Cancelled`] once `cancel` fires.
    async fn fetch_page(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, FetchError>;
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpFetcher {
    inner: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Construct a fetcher with [`FetcherConfig::default`].
    ///
    /// ```no_run
    /// use linkmeta_http::{FetchError, HttpFetcher};
    /// use std::time::Duration;
    ///
    /// let fetcher = HttpFetcher::new()?;
    /// assert_eq!(fetcher.config().timeout, Duration::from_secs(15));
    /// assert_eq!(fetcher.config().max_redirects, 10);
    /// # Ok::<(), FetchError>(())
    /// ```
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(FetcherConfig::default())
    }

    pub fn with_config(config: FetcherConfig) -> Result<Self, FetchError> {
        let policy = if config.max_redirects == 0 {
            redirect::Policy::none()
        } else {
            redirect::Policy::limited(config.max_redirects)
        };

        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .redirect(policy);

        if let Some(ua) = config.user_agent.as_deref().filter(|ua| !ua.is_empty()) {
            let value = HeaderValue::from_str(ua)
                .map_err(|e| FetchError::Build(format!("invalid user agent: {e}")))?;
            builder = builder.user_agent(value);
        }

        let inner = builder
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;
        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch `url` with no way to abort other than the configured timeout.
    pub async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        self.fetch_with_cancel(url, &CancellationToken::new()).await
    }

    /// Fetch `url`, racing the request against `cancel`.
    ///
    /// Losing the race drops the in-flight request, which releases its
    /// connection.
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, FetchError> {
        let req_id = next_req_id();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(req_id=%req_id, url=%url, "http.cancelled");
                Err(FetchError::Cancelled { url: url.to_string() })
            }
            res = self.fetch_once(&req_id, url) => res,
        }
    }

    async fn fetch_once(&self, req_id: &str, url: &str) -> Result<FetchedDocument, FetchError> {
        if url.trim().is_empty() {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                message: "empty URL".into(),
            });
        }
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let timeout = self.config.timeout;
        let requested = parsed.to_string();
        let (host_path, redacted_q) = redact_query(&parsed);

        tracing::debug!(
            req_id=%req_id,
            host_path=%host_path,
            query=?redacted_q,
            timeout_ms=timeout.as_millis() as u64,
            max_redirects=self.config.max_redirects,
            "http.request.start"
        );

        if raw_enabled() {
            let curl = make_curl(&parsed, self.config.user_agent.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        // ----- Send -----
        let t0 = Instant::now();
        let resp = match self.inner.get(parsed).send().await {
            Ok(resp) => resp,
            Err(err) => {
                let err = classify(url, &self.config, err);
                tracing::warn!(req_id=%req_id, error=%err, "http.error.send");
                return Err(err);
            }
        };

        let status = resp.status();
        let final_url = resp.url().to_string();
        let headers = resp.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // An error page is never handed to the extractor; its body stays unread.
        if !status.is_success() {
            tracing::warn!(
                req_id=%req_id,
                %status,
                final_url=%final_url,
                duration_ms=t0.elapsed().as_millis() as u64,
                "http.error"
            );
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = classify(url, &self.config, err);
                tracing::warn!(req_id=%req_id, error=%err, "http.error.body");
                return Err(err);
            }
        };
        let dur_ms = t0.elapsed().as_millis() as u64;

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            content_type=?content_type,
            redirected=%(final_url != requested),
            "http.response.headers"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let truncated = bytes.len() > RAW_MAX_BODY;
            let body = &bytes[..bytes.len().min(RAW_MAX_BODY)];
            let text = String::from_utf8_lossy(body);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }

        tracing::trace!(
            req_id=%req_id,
            body_snippet=%snip_body(&bytes),
            "http.response.body_snippet"
        );

        Ok(FetchedDocument {
            bytes,
            content_type,
            source_url: url.to_string(),
            final_url,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, FetchError> {
        self.fetch_with_cancel(url, cancel).await
    }
}

// ==============================
// Helpers
// ==============================

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(&body[..body.len().min(SNIPPET_MAX)]).into_owned();
    if body.len() > SNIPPET_MAX {
        snip.push_str("...");
    }
    snip
}

fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    // Return "host + path" string and redacted query list for logging
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = v.to_string();
            let is_secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token"
                    | "authorization"
                    | "auth"
                    | "key"
                    | "api_key"
                    | "token"
                    | "secret"
                    | "client_secret"
                    | "bearer"
            );
            (k, if is_secret { "<redacted>".into() } else { v })
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_secret_query_params() {
        let url = Url::parse("https://example.com/a/b?token=s3cret&page=2").unwrap();
        let (host_path, q) = redact_query(&url);
        assert_eq!(host_path, "example.com/a/b");
        assert_eq!(
            q,
            vec![
                ("token".to_string(), "<redacted>".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn curl_line_never_contains_secrets() {
        let url = Url::parse("https://example.com/x?api_key=abc&q=rust").unwrap();
        let curl = make_curl(&url, Some("linkmeta/test"));
        assert!(curl.contains("api_key=<redacted>"));
        assert!(curl.contains("q=rust"));
        assert!(!curl.contains("abc"));
        assert!(curl.contains("-A 'linkmeta/test'"));
    }

    #[test]
    fn transient_classification() {
        let status = |s: StatusCode| FetchError::HttpStatus {
            url: "u".into(),
            status: s,
        };
        assert!(status(StatusCode::SERVICE_UNAVAILABLE).is_transient());
        assert!(status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!status(StatusCode::NOT_FOUND).is_transient());
        assert!(
            FetchError::Timeout {
                url: "u".into(),
                phase: TimeoutPhase::Request,
                timeout: Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(!FetchError::Cancelled { url: "u".into() }.is_transient());
        assert_eq!(status(StatusCode::NOT_FOUND).status_code(), Some(404));
        assert_eq!(FetchError::Build("x".into()).status_code(), None);
    }

    #[test]
    fn connect_timeout_reports_the_connect_limit() {
        let cfg = FetcherConfig::default()
            .with_timeout(Duration::from_secs(15))
            .with_connect_timeout(Duration::from_secs(5));

        let err = timeout_error("https://slow.test/", &cfg, true);
        assert!(matches!(
            err,
            FetchError::Timeout { phase: TimeoutPhase::Connect, timeout, .. }
                if timeout == Duration::from_secs(5)
        ));
        assert_eq!(
            err.to_string(),
            "connect timed out after 5s fetching https://slow.test/"
        );

        let err = timeout_error("https://slow.test/", &cfg, false);
        assert!(matches!(
            err,
            FetchError::Timeout { phase: TimeoutPhase::Request, timeout, .. }
                if timeout == Duration::from_secs(15)
        ));
    }

    #[test]
    fn snippet_is_truncated() {
        let body = vec![b'a'; SNIPPET_MAX + 10];
        let snip = snip_body(&body);
        assert_eq!(snip.len(), SNIPPET_MAX + 3);
        assert!(snip.ends_with("..."));
        assert_eq!(snip_body(b"short"), "short");
    }

    #[test]
    fn empty_user_agent_builds_without_header() {
        let cfg = FetcherConfig::default().with_user_agent(Some(String::new()));
        assert!(HttpFetcher::with_config(cfg).is_ok());
    }

    #[test]
    fn control_chars_in_user_agent_are_rejected() {
        let cfg = FetcherConfig::default().with_user_agent(Some("bad\nagent".into()));
        assert!(matches!(
            HttpFetcher::with_config(cfg),
            Err(FetchError::Build(_))
        ));
    }

    #[tokio::test]
    async fn empty_url_is_invalid_without_network() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("   ").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn relative_url_is_invalid() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("/just/a/path").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
