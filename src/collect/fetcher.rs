//! Page fetching seam supplied by the host application.

use async_trait::async_trait;
use thiserror::Error;

use super::model::PageResult;
use crate::Platform;

/// Errors a page fetch can surface.
///
/// A fetch error terminates the collection run early; the collector hands the
/// partial aggregate back alongside the error and never retries internally.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Network/transport failure talking to the listing API.
    #[error("transport failure fetching page at cursor '{cursor}': {message}")]
    Transport {
        /// The cursor that was being fetched.
        cursor: String,
        /// Human-readable transport error text.
        message: String,
    },

    /// The page response could not be understood.
    #[error("malformed page response at cursor '{cursor}': {message}")]
    Parse {
        /// The cursor that was being fetched.
        cursor: String,
        /// What failed to parse.
        message: String,
    },

    /// No usable credential for the platform.
    #[error("no valid credential for {platform}")]
    AuthMissing {
        /// The platform that rejected the request.
        platform: Platform,
    },
}

impl FetchError {
    /// Creates a transport failure for a cursor.
    pub fn transport(cursor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            cursor: cursor.into(),
            message: message.into(),
        }
    }

    /// Creates a parse failure for a cursor.
    pub fn parse(cursor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            cursor: cursor.into(),
            message: message.into(),
        }
    }
}

/// One implementation per remote platform, supplied externally.
///
/// The fetcher owns the platform's HTTP mechanics and page grammar; the
/// collector only drives cursors through it. An empty `next_cursor` in the
/// returned page marks the end of the listing.
///
/// # Object Safety
///
/// Uses `async_trait` so platform fetchers can be handed around as
/// `Box<dyn PageFetcher>` from the composition root.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// The platform this fetcher serves.
    fn platform(&self) -> Platform;

    /// Fetches one page. An empty `cursor` requests the first page.
    async fn fetch(&self, cursor: &str) -> Result<PageResult, FetchError>;
}
