use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No title found";
pub const NO_DESCRIPTION: &str = "No description found";
pub const NO_AUTHOR: &str = "No author found";
pub const NO_DATE: &str = "No date found";
pub const NO_IMAGE: &str = "No image link found";

/// One of the five metadata fields a page is searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Date,
    Author,
    Description,
    Image,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Title,
        Field::Date,
        Field::Author,
        Field::Description,
        Field::Image,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Date => "date",
            Field::Author => "author",
            Field::Description => "description",
            Field::Image => "image",
        }
    }

    /// Value a result carries when nothing was found for this field.
    pub fn sentinel(self) -> &'static str {
        match self {
            Field::Title => NO_TITLE,
            Field::Date => NO_DATE,
            Field::Author => NO_AUTHOR,
            Field::Description => NO_DESCRIPTION,
            Field::Image => NO_IMAGE,
        }
    }
}

/// Normalized page summary.
///
/// Every field is always filled: a field with no data holds its sentinel
/// (see [`Field::sentinel`]) so consumers never branch on missing keys.
/// `url` is the caller's URL exactly as given.
///
/// ```
/// use linkmeta_web::{Field, MetadataResult};
///
/// let empty = MetadataResult::sentinels("https://example.com/?q=1");
/// assert_eq!(empty.title, "No title found");
/// assert!(!empty.has(Field::Image));
///
/// let json = serde_json::to_string(&empty).unwrap();
/// assert!(json.starts_with(r#"{"title":"No title found","date":"No date found""#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataResult {
    pub title: String,
    pub date: String,
    pub author: String,
    pub description: String,
    pub image: String,
    pub url: String,
}

impl MetadataResult {
    /// A result with every field unresolved.
    pub fn sentinels(url: impl Into<String>) -> Self {
        Self {
            title: NO_TITLE.to_string(),
            date: NO_DATE.to_string(),
            author: NO_AUTHOR.to_string(),
            description: NO_DESCRIPTION.to_string(),
            image: NO_IMAGE.to_string(),
            url: url.into(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Date => &self.date,
            Field::Author => &self.author,
            Field::Description => &self.description,
            Field::Image => &self.image,
        }
    }

    /// True when `field` holds real data rather than its sentinel.
    pub fn has(&self, field: Field) -> bool {
        self.get(field) != field.sentinel()
    }

    /// Number of fields that resolved to real data.
    pub fn resolved_count(&self) -> usize {
        Field::ALL.iter().filter(|f| self.has(**f)).count()
    }
}
