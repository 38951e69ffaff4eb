use linkmeta_http::FetchedDocument;

use crate::document::{PageDocument, ParseError};
use crate::resolver::{Profile, ResolverSet};
use crate::result::MetadataResult;

/// Runs the five field chains over a fetched page.
///
/// Stateless and deterministic: the same document always yields the same
/// result, and one extractor may serve any number of concurrent callers.
///
/// ```
/// use linkmeta_http::FetchedDocument;
/// use linkmeta_web::Extractor;
///
/// let doc = FetchedDocument::from_bytes(
///     "https://example.com/p",
///     r#"<title> Post </title><meta name="author" content="Jo">"#,
/// );
/// let meta = Extractor::default().extract(&doc).unwrap();
/// assert_eq!(meta.title, "Post");
/// assert_eq!(meta.author, "Jo");
/// assert_eq!(meta.date, "No date found");
/// assert_eq!(meta.url, "https://example.com/p");
/// ```
#[derive(Clone, Debug)]
pub struct Extractor {
    profile: Profile,
    resolvers: ResolverSet,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Profile::Standard)
    }
}

impl Extractor {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            resolvers: ResolverSet::for_profile(profile),
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Extract metadata, reporting the document's own `source_url` as `url`.
    pub fn extract(&self, doc: &FetchedDocument) -> Result<MetadataResult, ParseError> {
        self.extract_as(&doc.source_url, doc)
    }

    /// Extract metadata from `doc`, reporting `url` verbatim in the result.
    pub fn extract_as(&self, url: &str, doc: &FetchedDocument) -> Result<MetadataResult, ParseError> {
        let page = PageDocument::from_bytes(&doc.bytes, doc.content_type.as_deref()).inspect_err(
            |e| tracing::debug!(url = %url, error = %e, "extract.parse_error"),
        )?;
        Ok(self.run(url, &page, doc.bytes.len()))
    }

    /// Extract metadata from markup already held as text. Never fails.
    pub fn extract_html(&self, url: &str, html: &str) -> MetadataResult {
        self.run(url, &PageDocument::parse(html), html.len())
    }

    fn run(&self, url: &str, page: &PageDocument, body_len: usize) -> MetadataResult {
        let result = self.resolvers.resolve(page, url);
        tracing::debug!(
            url = %url,
            profile = ?self.profile,
            body_len,
            resolved = result.resolved_count(),
            "extract.done"
        );
        result
    }
}
