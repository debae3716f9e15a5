//! Job record types and status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::collect::{MediaKind, MediaReference, Platform};
use crate::filename;

/// Status of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker slot.
    Pending,
    /// A worker is streaming the transfer.
    Downloading,
    /// Transfer finished; `storage_ref` and `completed_at` are set.
    Completed,
    /// The attempt failed terminally; `error_message` is set.
    Failed,
}

impl JobStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid job status: {s}")),
        }
    }
}

/// A persisted download job. One row per media URL.
///
/// `id` is stable across retries of the same logical item; every write is an
/// upsert keyed by it. `storage_ref` is only ever set on Completed rows and
/// `error_message` only on Failed rows.
#[derive(Debug, Clone, FromRow)]
pub struct DownloadJob {
    /// Primary key: `{platform}-{source_id}-{url_index}`.
    pub id: String,
    /// Platform the media came from (stored as text, parsed via `platform()`).
    #[sqlx(rename = "platform")]
    pub platform_str: String,
    /// Platform-unique identity of the owning post/item.
    pub owner_id: String,
    /// Display name/handle of the owning account, when known.
    pub owner_label: Option<String>,
    /// The direct media URL to transfer.
    pub source_url: String,
    /// Target file name; regenerated on retry.
    pub file_name: String,
    /// Media kind (stored as text, parsed via `media_kind()`).
    #[sqlx(rename = "media_kind")]
    pub media_kind_str: String,
    /// MIME type when known at discovery time.
    pub mime_type: Option<String>,
    /// Final size in bytes; 0 until completion.
    pub byte_size: i64,
    /// Current lifecycle status (stored as text, parsed via `status()`).
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Storage reference, set only when Completed.
    pub storage_ref: Option<String>,
    /// Last error, set only when Failed.
    pub error_message: Option<String>,
    /// When the row was (re)created. Blank on fresh in-memory jobs; the
    /// store fills it on upsert.
    pub created_at: String,
    /// Set exactly once, at the transition into Completed.
    pub completed_at: Option<String>,
}

impl DownloadJob {
    /// Builds the stable job id for one URL of a reference.
    #[must_use]
    pub fn make_id(platform: Platform, source_id: &str, url_index: usize) -> String {
        format!("{platform}-{source_id}-{url_index}")
    }

    /// Builds a fresh Pending job for the `url_index`-th URL of a reference.
    ///
    /// Returns `None` when the index is out of range.
    #[must_use]
    pub fn from_reference(reference: &MediaReference, url_index: usize) -> Option<Self> {
        let media = reference.urls.get(url_index)?;
        Some(Self {
            id: Self::make_id(reference.platform, &reference.source_id, url_index),
            platform_str: reference.platform.as_str().to_string(),
            owner_id: reference.source_id.clone(),
            owner_label: reference.owner_label.clone(),
            source_url: media.url.clone(),
            file_name: filename::build_file_name(
                reference.owner_label.as_deref(),
                &reference.source_id,
                url_index,
                &media.url,
            ),
            media_kind_str: media.kind.as_str().to_string(),
            mime_type: None,
            byte_size: 0,
            status_str: JobStatus::Pending.as_str().to_string(),
            storage_ref: None,
            error_message: None,
            created_at: String::new(),
            completed_at: None,
        })
    }

    /// Expands a reference into one Pending job per carried URL.
    #[must_use]
    pub fn expand(reference: &MediaReference) -> Vec<Self> {
        (0..reference.urls.len())
            .filter_map(|index| Self::from_reference(reference, index))
            .collect()
    }

    /// Rebuilds this job for an explicit retry: same identity, regenerated
    /// file name, Pending status, all completion/error fields cleared.
    ///
    /// `created_at` is blanked so the store stamps a fresh timestamp; retry
    /// is an identity-preserving full reset.
    #[must_use]
    pub fn reset_for_retry(&self) -> Self {
        Self {
            id: self.id.clone(),
            platform_str: self.platform_str.clone(),
            owner_id: self.owner_id.clone(),
            owner_label: self.owner_label.clone(),
            source_url: self.source_url.clone(),
            file_name: filename::regenerate_file_name(&self.file_name),
            media_kind_str: self.media_kind_str.clone(),
            mime_type: self.mime_type.clone(),
            byte_size: 0,
            status_str: JobStatus::Pending.as_str().to_string(),
            storage_ref: None,
            error_message: None,
            created_at: String::new(),
            completed_at: None,
        }
    }

    /// Returns the parsed status enum.
    ///
    /// Falls back to `Pending` if the status string is invalid.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status_str.parse().unwrap_or(JobStatus::Pending)
    }

    /// Returns the parsed platform.
    ///
    /// Falls back to `Twitter` if the platform string is invalid; the CHECK
    /// constraint makes that unreachable for persisted rows.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform_str.parse().unwrap_or(Platform::Twitter)
    }

    /// Returns the parsed media kind, falling back to `Photo`.
    #[must_use]
    pub fn media_kind(&self) -> MediaKind {
        self.media_kind_str.parse().unwrap_or(MediaKind::Photo)
    }
}

impl fmt::Display for DownloadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DownloadJob {{ id: {}, url: {}, status: {} }}",
            self.id,
            self.source_url,
            self.status()
        )
    }
}
