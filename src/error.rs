use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::fetch::FetchError;
use crate::store::PendingDownload;

/// Outcome of a failed media download.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Another task already claimed this URL during the current run.
    ///
    /// Not a failure by itself: `pending` reports how that attempt ends.
    #[error("download already attempted: {url}")]
    AlreadyAttempted { url: String, pending: PendingDownload },

    /// An earlier attempt at this URL during the current run failed.
    #[error("earlier download of {url} failed")]
    PreviouslyFailed { url: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The destination file could not be written.
    #[error("failed to save {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote page or API response did not have the expected shape.
    #[error("unexpected content at {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to save image belonging to album {album}: image_url={link}: {source}")]
    AlbumMember {
        album: String,
        link: String,
        #[source]
        source: Box<MediaError>,
    },

    #[error("resolving {url} timed out after {}s", .after.as_secs())]
    AttemptTimeout { url: String, after: Duration },
}

impl MediaError {
    pub(crate) fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Local I/O failures end the enclosing post; everything else only
    /// affects the link being resolved.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Save { .. } => true,
            Self::AlbumMember { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}
