use serde::Deserialize;
use tracing::warn;

use super::DiscoveryError;
use crate::domain::{id_from_url, QualityLabel, ResourceDescriptor, UrlTemplates};

/// A field the API sends as a string on some days and a number on others.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl LooseValue {
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            LooseValue::Text(s) => s.trim().to_string(),
            LooseValue::Int(n) => n.to_string(),
            LooseValue::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
            LooseValue::Float(f) => f.to_string(),
            LooseValue::Bool(_) | LooseValue::Other(_) => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Non-negative count; anything unparseable counts as zero.
    pub fn as_count(&self) -> u64 {
        match self {
            LooseValue::Int(n) => u64::try_from(*n).unwrap_or(0),
            LooseValue::Float(f) if f.is_finite() && *f >= 0.0 => *f as u64,
            LooseValue::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                cleaned
                    .parse::<u64>()
                    .ok()
                    .or_else(|| {
                        cleaned
                            .parse::<f64>()
                            .ok()
                            .filter(|f| f.is_finite() && *f >= 0.0)
                            .map(|f| f as u64)
                    })
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn as_flag(&self) -> bool {
        match self {
            LooseValue::Bool(b) => *b,
            LooseValue::Int(n) => *n != 0,
            LooseValue::Float(f) => *f != 0.0,
            LooseValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ),
            LooseValue::Other(_) => false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireWallpaper {
    #[serde(rename = "ID", alias = "Id", alias = "id")]
    id: Option<LooseValue>,
    #[serde(rename = "Title", alias = "title")]
    title: Option<LooseValue>,
    #[serde(rename = "Resolution", alias = "resolution")]
    resolution: Option<LooseValue>,
    #[serde(rename = "Rating", alias = "rating")]
    rating: Option<LooseValue>,
    #[serde(rename = "Downloads", alias = "downloads")]
    downloads: Option<LooseValue>,
    #[serde(rename = "UltraHD", alias = "ultra_hd")]
    ultra_hd: Option<LooseValue>,
    #[serde(rename = "UltraHDType", alias = "ultra_hd_type")]
    ultra_hd_type: Option<LooseValue>,
    #[serde(rename = "AIGenerated", alias = "ai_generated")]
    ai_generated: Option<LooseValue>,
    #[serde(rename = "MiniPhotoUrl", alias = "mini_photo_url")]
    mini_photo_url: Option<LooseValue>,
    #[serde(rename = "FullPhotoUrl", alias = "full_photo_url")]
    full_photo_url: Option<LooseValue>,
}

fn text(value: &Option<LooseValue>) -> Option<String> {
    value.as_ref().and_then(LooseValue::as_text)
}

impl WireWallpaper {
    fn into_descriptor(self, templates: &UrlTemplates) -> Option<ResourceDescriptor> {
        let thumbnail = text(&self.mini_photo_url).map(|url| url.to_lowercase());
        let id = text(&self.id).or_else(|| thumbnail.as_deref().and_then(id_from_url));
        let Some(id) = id else {
            warn!("Skipping API entry without an id");
            return None;
        };

        let thumbnail = thumbnail.unwrap_or_else(|| templates.thumbnail_url(&id));
        let full = text(&self.full_photo_url).unwrap_or_else(|| templates.full_url(&id));

        let mut descriptor = ResourceDescriptor::new(id, thumbnail, full);
        descriptor.quality = match text(&self.ultra_hd_type) {
            Some(label) => QualityLabel::parse(&label),
            None if self.ultra_hd.as_ref().is_some_and(LooseValue::as_flag) => QualityLabel::Uhd4k,
            None => QualityLabel::Unlabeled,
        };
        descriptor.is_ai_generated = self.ai_generated.as_ref().is_some_and(LooseValue::as_flag);
        descriptor.popularity = self.rating.as_ref().map_or(0, LooseValue::as_count);
        descriptor.downloads = self.downloads.as_ref().map_or(0, LooseValue::as_count);
        descriptor.title = text(&self.title);
        descriptor.resolution = text(&self.resolution);
        Some(descriptor)
    }
}

/// Normalize one page of the paging API into descriptors.
///
/// A `null` body is an empty page. Entries without a usable id are skipped.
pub fn parse_page(
    body: &[u8],
    templates: &UrlTemplates,
) -> Result<Vec<ResourceDescriptor>, DiscoveryError> {
    let entries: Option<Vec<WireWallpaper>> = serde_json::from_slice(body)
        .map_err(|e| DiscoveryError::SourceUnavailable(format!("Malformed payload: {}", e)))?;

    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| entry.into_descriptor(templates))
        .collect())
}
