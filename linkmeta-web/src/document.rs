//! Byte decoding and the queryable element tree.
//!
//! Parsing goes through `scraper` (html5ever), which never rejects markup: any
//! text becomes *some* tree. The one refusal is content that is not text at
//! all, detected by a NUL byte near the start of an ASCII-compatible body.
//!
//! The text encoding comes from, in order: a byte order mark, the
//! `Content-Type` charset, a `<meta charset>` / `http-equiv` declaration near
//! the top of the page, and finally UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use scraper::{ElementRef, Html};
use thiserror::Error;

/// How far into the body we look for a NUL byte before calling it binary.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// How far into the body a `<meta>` charset declaration is honoured.
const META_SNIFF_LEN: usize = 1024;

/// The fetched bytes could not be read as markup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("body is not markup: NUL byte at offset {offset} (content type {content_type:?})")]
    Binary {
        offset: usize,
        content_type: Option<String>,
    },
}

/// A parsed page, queryable by tag name and attribute.
pub struct PageDocument {
    html: Html,
}

impl PageDocument {
    /// Decode and parse raw response bytes.
    ///
    /// ```
    /// use linkmeta_web::PageDocument;
    ///
    /// let doc = PageDocument::from_bytes(b"<title>Hi</title>", None).unwrap();
    /// assert!(doc.first_element("title").is_some());
    ///
    /// assert!(PageDocument::from_bytes(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR", None).is_err());
    /// ```
    pub fn from_bytes(bytes: &[u8], content_type: Option<&str>) -> Result<Self, ParseError> {
        let text = decode(bytes, content_type)?;
        Ok(Self::parse(&text))
    }

    /// Parse already-decoded markup. Never fails.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Every element in document order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.tree.root().descendants().filter_map(ElementRef::wrap)
    }

    /// First element named `tag`.
    pub fn first_element(&self, tag: &str) -> Option<ElementRef<'_>> {
        self.elements().find(|el| el.value().name() == tag)
    }

    /// First element named `tag` whose `attr` equals `value` exactly.
    ///
    /// Only the first match is ever returned; later duplicates are invisible.
    pub fn find_first(&self, tag: &str, attr: &str, value: &str) -> Option<ElementRef<'_>> {
        self.elements()
            .find(|el| el.value().name() == tag && el.value().attr(attr) == Some(value))
    }

    /// First element named `tag` carrying `attr` at all, with its value.
    pub fn first_with_attr(&self, tag: &str, attr: &str) -> Option<&str> {
        self.elements()
            .filter(|el| el.value().name() == tag)
            .find_map(|el| el.value().attr(attr))
    }

    /// `content` of the first `<meta>` whose `attr` is `value`.
    ///
    /// ```
    /// use linkmeta_web::PageDocument;
    ///
    /// let doc = PageDocument::parse(
    ///     r#"<meta name="author" content="A"><meta name="author" content="B">"#,
    /// );
    /// assert_eq!(doc.meta_content("name", "author"), Some("A"));
    /// assert_eq!(doc.meta_content("name", "keywords"), None);
    /// ```
    pub fn meta_content(&self, attr: &str, value: &str) -> Option<&str> {
        self.find_first("meta", attr, value)?.value().attr("content")
    }

    /// Concatenated text of the first element named `tag`.
    pub fn element_text(&self, tag: &str) -> Option<String> {
        self.first_element(tag).map(|el| el.text().collect())
    }
}

/// Turn raw bytes into text the tree builder can consume.
fn decode<'a>(bytes: &'a [u8], content_type: Option<&str>) -> Result<Cow<'a, str>, ParseError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => {
            let encoding = content_type
                .and_then(header_charset)
                .or_else(|| meta_charset(bytes))
                .unwrap_or(UTF_8);
            (encoding, bytes)
        }
    };

    // A NUL is legal in UTF-16 text; only ASCII-compatible bodies are sniffed.
    if encoding.is_ascii_compatible() {
        let sniff = &body[..body.len().min(BINARY_SNIFF_LEN)];
        if let Some(offset) = sniff.iter().position(|b| *b == 0) {
            return Err(ParseError::Binary {
                offset,
                content_type: content_type.map(str::to_owned),
            });
        }
    }

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "document.decode.replaced");
    }
    Ok(text)
}

/// `charset` parameter of a `Content-Type` header value.
fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    let mime: mime::Mime = content_type.parse().ok()?;
    let charset = mime.get_param("charset")?;
    Encoding::for_label(charset.as_str().as_bytes())
}

/// Charset declared by a `<meta>` tag near the top of the page.
///
/// An in-page declaration of UTF-16 can't be true of bytes we just read as
/// ASCII, so it is taken to mean UTF-8.
fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = bytes[..bytes.len().min(META_SNIFF_LEN)].to_ascii_lowercase();
    let mut rest = head.as_slice();
    while let Some(start) = find(rest, b"<meta") {
        let tag = &rest[start..];
        let end = tag.iter().position(|b| *b == b'>').unwrap_or(tag.len());
        if let Some(encoding) = charset_attr(&tag[..end]) {
            return Some(encoding.output_encoding());
        }
        rest = &tag[end..];
    }
    None
}

// Covers both `charset="x"` and `content="text/html; charset=x"`.
fn charset_attr(tag: &[u8]) -> Option<&'static Encoding> {
    let at = find(tag, b"charset")? + b"charset".len();
    let value = tag[at..].trim_ascii_start().strip_prefix(b"=")?.trim_ascii_start();
    let value = value
        .strip_prefix(b"\"")
        .or_else(|| value.strip_prefix(b"'"))
        .unwrap_or(value);
    let end = value
        .iter()
        .position(|&b| matches!(b, b'"' | b'\'' | b';' | b'/' | b'>') || b.is_ascii_whitespace())
        .unwrap_or(value.len());
    Encoding::for_label(&value[..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
