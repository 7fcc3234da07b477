mod album;
mod registry;
mod traits;

// Site downloaders
pub mod imgbb;
pub mod imgur;
pub mod postimg;

use std::sync::Arc;
use std::time::Duration;

pub use album::{download_album, AlbumImage};
pub use registry::MediaRegistry;
pub use traits::MediaSite;

use crate::error::MediaError;
use crate::store::{settle, Store};

/// Registry with every supported site, in lookup order.
#[must_use]
pub fn default_registry(store: &Arc<Store>) -> MediaRegistry {
    let mut registry = MediaRegistry::new();
    registry.register(Box::new(imgur::ImgurDownloader::new(store.clone())));
    registry.register(Box::new(postimg::PostimgDownloader::new(store.clone())));
    registry.register(Box::new(imgbb::ImgbbDownloader::new(store.clone())));
    registry
}

/// Turns links found in message bodies into local files.
pub struct MediaResolver {
    registry: MediaRegistry,
    attempt_timeout: Duration,
}

impl MediaResolver {
    #[must_use]
    pub fn new(registry: MediaRegistry, attempt_timeout: Duration) -> Self {
        Self {
            registry,
            attempt_timeout,
        }
    }

    /// Download the media behind `url` and return its local filename.
    ///
    /// Returns `Ok(None)` when no site recognises the URL. The whole attempt,
    /// album members included, must finish within the attempt timeout. If
    /// another task already owns the URL, its outcome is waited for instead.
    ///
    /// # Errors
    ///
    /// Returns the claiming site's error, a timeout, or
    /// [`MediaError::PreviouslyFailed`] if the owning task failed.
    pub async fn resolve(&self, url: &str) -> Result<Option<String>, MediaError> {
        let attempt = tokio::time::timeout(self.attempt_timeout, self.registry.download(url))
            .await
            .map_err(|_| MediaError::AttemptTimeout {
                url: url.to_string(),
                after: self.attempt_timeout,
            })?;

        match attempt {
            Ok(found) => Ok(found),
            Err(e) => settle(Err(e)).await.map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetcher;
    use tokio_util::sync::CancellationToken;

    fn store_in(dir: &std::path::Path) -> Arc<Store> {
        Arc::new(Store::new(
            dir,
            Fetcher::new(Duration::from_secs(5)).unwrap(),
            CancellationToken::new(),
        ))
    }

    #[test]
    fn test_default_registry_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(&store_in(dir.path()));
        let ids: Vec<_> = registry.sites().iter().map(|s| s.site_id()).collect();
        assert_eq!(ids, vec!["imgur", "postimg", "imgbb"]);
    }

    #[tokio::test]
    async fn test_unrecognised_url_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = MediaResolver::new(
            default_registry(&store_in(dir.path())),
            Duration::from_secs(1),
        );

        assert_eq!(resolver.resolve("https://example.com/cat.png").await.unwrap(), None);
        assert_eq!(resolver.resolve("https://postimg.cc/AbC123").await.unwrap(), None);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
