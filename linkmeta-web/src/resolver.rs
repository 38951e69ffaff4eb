//! Per-field fallback chains.
//!
//! A chain is an ordered list of lookups; the first to produce a non-blank
//! value wins and nothing after it runs. An exhausted chain yields the field's
//! sentinel. Chains never see each other's results.

use crate::document::PageDocument;
use crate::result::{Field, MetadataResult};

/// A single lookup strategy: pure, side-effect free.
pub(crate) type Lookup = fn(&PageDocument) -> Option<String>;

/// Which chains the extractor runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Profile {
    /// One strategy per field: `<title>`, `name=description`, `name=author`,
    /// `article:published_time`, `og:image`.
    #[default]
    Standard,
    /// Standard strategies first, then Open Graph / Twitter card / markup
    /// fallbacks.
    Extended,
}

#[derive(Clone, Debug)]
pub(crate) struct FieldResolver {
    field: Field,
    strategies: Vec<(&'static str, Lookup)>,
}

impl FieldResolver {
    pub(crate) fn new(field: Field) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub(crate) fn then(mut self, name: &'static str, lookup: Lookup) -> Self {
        self.strategies.push((name, lookup));
        self
    }

    pub(crate) fn resolve(&self, doc: &PageDocument) -> String {
        for (name, lookup) in &self.strategies {
            if let Some(value) = lookup(doc).filter(|v| !v.trim().is_empty()) {
                tracing::trace!(field = self.field.name(), strategy = *name, "extract.field.resolved");
                return value;
            }
        }
        tracing::trace!(field = self.field.name(), "extract.field.sentinel");
        self.field.sentinel().to_string()
    }

    #[cfg(test)]
    pub(crate) fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }
}

/// The five chains for one profile.
#[derive(Clone, Debug)]
pub(crate) struct ResolverSet {
    title: FieldResolver,
    date: FieldResolver,
    author: FieldResolver,
    description: FieldResolver,
    image: FieldResolver,
}

impl ResolverSet {
    pub(crate) fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Standard => Self::standard(),
            Profile::Extended => Self::extended(),
        }
    }

    fn standard() -> Self {
        Self {
            title: FieldResolver::new(Field::Title).then("title", title_text),
            date: FieldResolver::new(Field::Date)
                .then("article:published_time", article_published_time),
            author: FieldResolver::new(Field::Author).then("meta:author", meta_author),
            description: FieldResolver::new(Field::Description)
                .then("meta:description", meta_description),
            image: FieldResolver::new(Field::Image).then("og:image", og_image),
        }
    }

    fn extended() -> Self {
        let base = Self::standard();
        Self {
            title: base
                .title
                .then("og:title", og_title)
                .then("twitter:title", twitter_title)
                .then("h1", first_h1),
            date: base
                .date
                .then("time[datetime]", time_datetime)
                .then("dc.date", dc_date),
            author: base
                .author
                .then("article:author", article_author)
                .then("rel=author", rel_author_text),
            description: base
                .description
                .then("og:description", og_description)
                .then("twitter:description", twitter_description),
            image: base
                .image
                .then("twitter:image", twitter_image)
                .then("link:image_src", link_image_src),
        }
    }

    pub(crate) fn resolve(&self, doc: &PageDocument, url: &str) -> MetadataResult {
        MetadataResult {
            title: self.title.resolve(doc),
            date: self.date.resolve(doc),
            author: self.author.resolve(doc),
            description: self.description.resolve(doc),
            image: self.image.resolve(doc),
            url: url.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn chain(&self, field: Field) -> &FieldResolver {
        match field {
            Field::Title => &self.title,
            Field::Date => &self.date,
            Field::Author => &self.author,
            Field::Description => &self.description,
            Field::Image => &self.image,
        }
    }
}

// ==============================
// Lookups
// ==============================

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn title_text(doc: &PageDocument) -> Option<String> {
    doc.element_text("title").map(|t| t.trim().to_string())
}

fn meta_named(doc: &PageDocument, name: &str) -> Option<String> {
    doc.meta_content("name", name).map(str::to_owned)
}

fn meta_property(doc: &PageDocument, property: &str) -> Option<String> {
    doc.meta_content("property", property).map(str::to_owned)
}

fn meta_description(doc: &PageDocument) -> Option<String> {
    meta_named(doc, "description")
}

fn meta_author(doc: &PageDocument) -> Option<String> {
    meta_named(doc, "author")
}

fn article_published_time(doc: &PageDocument) -> Option<String> {
    meta_property(doc, "article:published_time")
}

fn og_image(doc: &PageDocument) -> Option<String> {
    meta_property(doc, "og:image")
}

fn og_title(doc: &PageDocument) -> Option<String> {
    meta_property(doc, "og:title")
}

fn twitter_title(doc: &PageDocument) -> Option<String> {
    meta_named(doc, "twitter:title")
}

fn first_h1(doc: &PageDocument) -> Option<String> {
    doc.element_text("h1").map(|t| collapse_whitespace(&t))
}

fn time_datetime(doc: &PageDocument) -> Option<String> {
    doc.first_with_attr("time", "datetime").map(str::to_owned)
}

fn dc_date(doc: &PageDocument) -> Option<String> {
    meta_named(doc, "dc.date")
}

fn article_author(doc: &PageDocument) -> Option<String> {
    meta_property(doc, "article:author")
}

fn rel_author_text(doc: &PageDocument) -> Option<String> {
    doc.elements()
        .find(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t == "author"))
        })
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
}

fn og_description(doc: &PageDocument) -> Option<String> {
    meta_property(doc, "og:description")
}

fn twitter_description(doc: &PageDocument) -> Option<String> {
    meta_named(doc, "twitter:description")
}

fn twitter_image(doc: &PageDocument) -> Option<String> {
    meta_named(doc, "twitter:image")
}

fn link_image_src(doc: &PageDocument) -> Option<String> {
    doc.find_first("link", "rel", "image_src")?
        .value()
        .attr("href")
        .map(str::to_owned)
}
