//! Reading and writing bdfr post files.

mod message;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use message::{BodyMut, Post};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode post for {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read one saved post from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a post.
pub async fn read_post(path: &Path) -> Result<Post, ArchiveError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ArchiveError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_slice(&bytes).map_err(|source| ArchiveError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a post to disk, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the post cannot be encoded or written.
pub async fn write_post(path: &Path, post: &Post) -> Result<(), ArchiveError> {
    let bytes = serde_json::to_vec(post).map_err(|source| ArchiveError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| ArchiveError::Write {
            path: path.to_path_buf(),
            source,
        })
}
