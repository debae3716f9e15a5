//! Storage seam: streams a remote URL into local storage.

use async_trait::async_trait;
use thiserror::Error;

use crate::cancel::CancelToken;

/// Callback invoked as chunks land: `(bytes_written, total_hint)`.
///
/// `total_hint` is the expected total size when the transport knows it.
pub type ChunkObserver<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

/// A successfully stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Opaque reference used to address (and later delete) the artifact.
    pub storage_ref: String,
    /// Final size in bytes.
    pub byte_size: u64,
}

/// Errors a storage transfer can surface.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Network failure while streaming the source URL.
    #[error("transport failure streaming {url}: {message}")]
    Transport {
        /// The URL being streamed.
        url: String,
        /// Human-readable transport error text.
        message: String,
    },

    /// Local write failure.
    #[error("storage write failure: {message}")]
    Io {
        /// What failed locally.
        message: String,
    },

    /// The cancel token fired mid-transfer. Not a terminal job failure:
    /// pause/cancel own the row after this is returned.
    #[error("transfer cancelled")]
    Cancelled,
}

impl StorageError {
    /// Creates a transport error for a URL.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a local write error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

/// Streams remote media into local storage, supplied by the host application.
///
/// Implementations must watch `cancel` inside their streaming loop and return
/// [`StorageError::Cancelled`] promptly when it fires, cleaning up their own
/// partial artifact in that case. `delete` is only called with a
/// `storage_ref` previously returned from `stream`.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Streams `url` to storage, reporting chunk progress through `on_chunk`.
    async fn stream(
        &self,
        url: &str,
        cancel: &CancelToken,
        on_chunk: ChunkObserver<'_>,
    ) -> Result<StoredArtifact, StorageError>;

    /// Deletes a previously stored artifact.
    async fn delete(&self, storage_ref: &str) -> Result<(), StorageError>;
}
