//! Data model for collected media references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported remote platforms.
///
/// This is a closed set: each variant is bound to its own `PageFetcher` and
/// storage wiring at composition time. Stored as text in the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitter,
    Lofter,
    Pixiv,
    Kuaikan,
    #[serde(rename = "missevan")]
    MissEvan,
}

impl Platform {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Lofter => "lofter",
            Self::Pixiv => "pixiv",
            Self::Kuaikan => "kuaikan",
            Self::MissEvan => "missevan",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "twitter" => Ok(Self::Twitter),
            "lofter" => Ok(Self::Lofter),
            "pixiv" => Ok(Self::Pixiv),
            "kuaikan" => Ok(Self::Kuaikan),
            "missevan" => Ok(Self::MissEvan),
            _ => Err(format!("invalid platform: {s}")),
        }
    }
}

/// Kind of media behind a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            _ => Err(format!("invalid media kind: {s}")),
        }
    }
}

/// One downloadable URL carried by a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrl {
    /// What the URL points at.
    pub kind: MediaKind,
    /// The direct media URL.
    pub url: String,
}

impl MediaUrl {
    /// Convenience constructor.
    #[must_use]
    pub fn new(kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// One discovered unit of downloadable content (post/chapter/episode).
///
/// Identity is `source_id` alone: two references with the same id are the
/// same item regardless of every other field.
#[derive(Debug, Clone)]
pub struct MediaReference {
    /// Platform-unique identity used for dedup (post/tweet id).
    pub source_id: String,
    /// Display name or handle of the owning account, when known.
    pub owner_label: Option<String>,
    /// The media URLs carried by this item (photo set, video variants).
    pub urls: Vec<MediaUrl>,
    /// Platform the item was discovered on.
    pub platform: Platform,
}

/// Result of fetching one page from a listing API.
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    /// Items discovered on this page (may repeat items from earlier pages).
    pub items: Vec<MediaReference>,
    /// Cursor for the next page; empty means this was the last page.
    pub next_cursor: String,
    /// Owner label, when the page carries one. The first non-empty value
    /// across pages wins.
    pub owner_label: Option<String>,
}
