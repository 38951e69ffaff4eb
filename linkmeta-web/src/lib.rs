//! Page metadata extraction.
//!
//! - Tolerant parsing into a queryable tree (`document`)
//! - Ordered per-field fallback chains with sentinel defaults (`resolver`)
//! - The [`Extractor`] that runs them over a fetched page (`extract`)
//! - Validation + fetch + extract as one call (`pipeline`)
//! - Bounded concurrent extraction over many URLs (`batch`)
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), linkmeta_web::PageMetadataError> {
//! let meta = linkmeta_web::extract_page_metadata("https://example.com/post").await?;
//! println!("{} by {}", meta.title, meta.author);
//! # Ok(()) }
//! ```

pub mod batch;
pub mod document;
pub mod extract;
pub mod pipeline;
mod resolver;
pub mod result;

pub use batch::{BatchOutcome, extract_many};
pub use document::{PageDocument, ParseError};
pub use extract::Extractor;
pub use pipeline::{
    ExtractionRequest, MetadataService, PageMetadataError, ValidationError, extract_page_metadata,
};
pub use resolver::Profile;
pub use result::{Field, MetadataResult};
