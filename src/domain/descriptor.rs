use std::fmt;

use serde::{Deserialize, Serialize};

/// Advisory quality label reported by a source.
///
/// Labels are never checked against real pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QualityLabel {
    #[default]
    Unlabeled,
    Uhd4k,
    Uhd5k,
    Uhd8k,
    Other(String),
}

impl QualityLabel {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "" => QualityLabel::Unlabeled,
            "4K" => QualityLabel::Uhd4k,
            "5K" => QualityLabel::Uhd5k,
            "8K" => QualityLabel::Uhd8k,
            _ => QualityLabel::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QualityLabel::Unlabeled => "",
            QualityLabel::Uhd4k => "4K",
            QualityLabel::Uhd5k => "5K",
            QualityLabel::Uhd8k => "8K",
            QualityLabel::Other(s) => s,
        }
    }

    pub fn is_labeled(&self) -> bool {
        !matches!(self, QualityLabel::Unlabeled)
    }
}

impl From<String> for QualityLabel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<QualityLabel> for String {
    fn from(value: QualityLabel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL patterns for resources addressed by numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTemplates {
    pub thumbnail: String,
    pub full: String,
}

impl UrlTemplates {
    pub const PLACEHOLDER: &'static str = "{id}";

    pub fn thumbnail_url(&self, id: &str) -> String {
        self.thumbnail.replace(Self::PLACEHOLDER, id)
    }

    pub fn full_url(&self, id: &str) -> String {
        self.full.replace(Self::PLACEHOLDER, id)
    }
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self {
            thumbnail: "https://backiee.com/static/wallpapers/560x315/{id}.jpg".to_string(),
            full: "https://backiee.com/static/wallpapers/wide/{id}.jpg".to_string(),
        }
    }
}

/// One discovered wallpaper.
///
/// Two descriptors with the same `id` are the same resource, whatever the
/// other fields say. The id cannot be changed after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    id: String,
    pub thumbnail_url: String,
    pub full_url: String,
    #[serde(default)]
    pub quality: QualityLabel,
    #[serde(default)]
    pub is_ai_generated: bool,
    #[serde(default)]
    pub popularity: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(
        id: impl Into<String>,
        thumbnail_url: impl Into<String>,
        full_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            thumbnail_url: thumbnail_url.into(),
            full_url: full_url.into(),
            quality: QualityLabel::Unlabeled,
            is_ai_generated: false,
            popularity: 0,
            downloads: 0,
            title: None,
            resolution: None,
        }
    }

    /// Build a descriptor for a numeric id using the given URL patterns.
    pub fn from_numeric_id(id: u64, templates: &UrlTemplates) -> Self {
        let id = id.to_string();
        let thumbnail = templates.thumbnail_url(&id);
        let full = templates.full_url(&id);
        Self::new(id, thumbnail, full)
    }

    /// Build a descriptor from a bare image URL, using its file stem as id.
    pub fn from_image_url(url: &str) -> Option<Self> {
        let id = id_from_url(url)?;
        Some(Self::new(id, url, url))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// File stem of the last path segment, e.g. `.../560x315/123456.jpg` -> `123456`.
pub fn id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let file = path.rsplit('/').next()?;
    let stem = match file.rfind('.') {
        Some(0) | None => file,
        Some(idx) => &file[..idx],
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
