use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordering requested from the paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Latest,
    Popularity,
    Downloads,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Latest => "latest",
            SortMode::Popularity => "popularity",
            SortMode::Downloads => "downloads",
        }
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(SortMode::Latest),
            "popularity" => Ok(SortMode::Popularity),
            "downloads" => Ok(SortMode::Downloads),
            other => Err(format!(
                "Unknown sort mode: {}. Use latest, popularity or downloads",
                other
            )),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI-generated content filter, sent as `all`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AiFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "0")]
    ExcludeAi,
    #[serde(rename = "1")]
    OnlyAi,
}

impl AiFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiFilter::All => "all",
            AiFilter::ExcludeAi => "0",
            AiFilter::OnlyAi => "1",
        }
    }
}

impl FromStr for AiFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(AiFilter::All),
            "0" | "no" | "exclude" => Ok(AiFilter::ExcludeAi),
            "1" | "yes" | "only" => Ok(AiFilter::OnlyAi),
            other => Err(format!("Unknown AI filter: {}. Use all, 0 or 1", other)),
        }
    }
}

impl fmt::Display for AiFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters passed to the paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub sort: SortMode,
    pub category: String,
    pub ai: AiFilter,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            sort: SortMode::Latest,
            category: "all".to_string(),
            ai: AiFilter::All,
        }
    }
}

impl FilterParams {
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}
