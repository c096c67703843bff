use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source platform of a collected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Youtube,
    X,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Youtube => "youtube",
            Platform::X => "x",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reddit" => Ok(Platform::Reddit),
            "youtube" => Ok(Platform::Youtube),
            "x" | "twitter" => Ok(Platform::X),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Comment,
    Video,
    Transcript,
}

/// A single piece of content handed to the pipeline by a collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub platform: Platform,
    pub content_type: ContentType,
    /// Unique per platform.
    pub source_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Named counters such as `upvotes`, `likes`, `views`, `comments`.
    #[serde(default)]
    pub metrics: BTreeMap<String, i64>,
    /// Collector-specific payload, carried through untouched.
    #[serde(default)]
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl RawItem {
    /// The text the pipeline analyses: `content`, falling back to `title`.
    ///
    /// An empty `content` string counts as absent.
    #[must_use]
    pub fn visible_text(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.title.as_deref())
            .unwrap_or("")
    }

    /// Read a counter, treating missing and negative values as zero.
    #[must_use]
    pub fn metric(&self, name: &str) -> u64 {
        self.metrics
            .get(name)
            .map_or(0, |v| u64::try_from(*v).unwrap_or(0))
    }

    /// Comment count. Collectors emit either `comments` or `num_comments`.
    #[must_use]
    pub fn comment_count(&self) -> u64 {
        self.metric("comments").max(self.metric("num_comments"))
    }

    /// Popularity proxy: `upvotes + 2*comments + 10*likes + views/1000`.
    #[must_use]
    pub fn engagement_score(&self) -> u64 {
        self.metric("upvotes")
            .saturating_add(self.comment_count().saturating_mul(2))
            .saturating_add(self.metric("likes").saturating_mul(10))
            .saturating_add(self.metric("views") / 1000)
    }
}
