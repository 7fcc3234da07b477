use async_trait::async_trait;

use crate::error::MediaError;

/// Trait for site-specific media downloaders.
#[async_trait]
pub trait MediaSite: Send + Sync {
    /// Unique identifier for this site.
    fn site_id(&self) -> &'static str;

    /// Priority for site selection (higher = preferred).
    fn priority(&self) -> i32 {
        0
    }

    /// Save the media behind `url` and return its local filename, relative
    /// to the destination directory.
    ///
    /// Returns `Ok(None)` if the URL does not belong to this site. A no-op
    /// that still returns the filename if the file is already on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if any download or save fails, or if the remote
    /// content does not have the expected shape.
    async fn download(&self, url: &str) -> Result<Option<String>, MediaError>;
}
