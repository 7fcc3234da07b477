//! Shared flow for albums: member images first, then a local gallery page.

use std::future::Future;

use reqwest::header::HeaderMap;
use tracing::debug;

use crate::error::MediaError;
use crate::gallery::build_gallery;
use crate::store::{settle, Store};

/// One image belonging to an album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumImage {
    /// Where the image bytes are fetched from.
    pub url: String,
    /// Local name override; the name derived from `url` otherwise.
    pub filename: Option<String>,
}

impl AlbumImage {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
        }
    }
}

/// Download every image of the album at `album_url` and save a gallery
/// under the album's own derived filename.
///
/// `list_images` is only called when the gallery is not already on disk.
/// Images are fetched one at a time in album order. The first failing image
/// aborts the album; images saved before it stay on disk.
///
/// # Errors
///
/// Returns an error if the album URL was already attempted, listing the
/// images fails, any image fails (here or in an earlier attempt this run),
/// or the gallery cannot be saved.
pub async fn download_album<F, Fut>(
    store: &Store,
    album_url: &str,
    headers: &HeaderMap,
    list_images: F,
) -> Result<String, MediaError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<AlbumImage>, MediaError>>,
{
    let desc = store.evaluate(album_url)?;
    if desc.is_local {
        return Ok(desc.filename);
    }

    let images = list_images().await?;
    debug!(album = %album_url, count = images.len(), "downloading album");

    let mut filenames = Vec::with_capacity(images.len());
    for image in images {
        // A member claimed elsewhere in this run is waited for, not refetched.
        let saved = settle(
            store
                .download_as(&image.url, headers, image.filename.as_deref())
                .await,
        )
        .await;
        let filename = saved.map_err(|e| MediaError::AlbumMember {
            album: album_url.to_string(),
            link: image.url,
            source: Box::new(e),
        })?;
        filenames.push(filename);
    }

    let gallery = build_gallery(&filenames).into_string();
    store.save_file(&desc.filename, gallery.as_bytes()).await?;

    let filename = desc.filename.clone();
    Ok(desc.saved_as(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetcher;
    use crate::store::url_to_filename;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_in(dir: &std::path::Path) -> Store {
        Store::new(
            dir,
            Fetcher::new(Duration::from_secs(5)).unwrap(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_album_gallery_preserves_order() {
        let server = MockServer::start().await;
        for name in ["one.png", "two.png"] {
            Mock::given(method("GET"))
                .and(path(format!("/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(name.as_bytes().to_vec()))
                .expect(1)
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let album = "https://example.com/album/1";
        let one = format!("{}/one.png", server.uri());
        let two = format!("{}/two.png", server.uri());

        let images = vec![AlbumImage::new(&two), AlbumImage::new(&one)];
        let name = download_album(&store, album, &HeaderMap::new(), move || async move { Ok(images) })
            .await
            .unwrap();
        assert_eq!(name, url_to_filename(album));

        let gallery = std::fs::read_to_string(dir.path().join(&name)).unwrap();
        let first = gallery.find(&url_to_filename(&two)).unwrap();
        let second = gallery.find(&url_to_filename(&one)).unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_existing_gallery_skips_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let album = "https://example.com/album/2";
        std::fs::write(dir.path().join(url_to_filename(album)), "<html></html>").unwrap();

        let name = download_album(&store, album, &HeaderMap::new(), move || async move {
            Err(MediaError::malformed(album, "should not be listed"))
        })
        .await
        .unwrap();
        assert_eq!(name, url_to_filename(album));
    }

    #[tokio::test]
    async fn test_failed_member_aborts_album() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bad.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let album = "https://example.com/album/3";
        let good = format!("{}/good.png", server.uri());
        let bad = format!("{}/bad.png", server.uri());

        let images = vec![AlbumImage::new(&good), AlbumImage::new(&bad)];
        let err = download_album(&store, album, &HeaderMap::new(), move || async move { Ok(images) })
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::AlbumMember { ref link, .. } if *link == bad));
        // Saved members are kept for the next run; the gallery is not written.
        assert!(dir.path().join(url_to_filename(&good)).exists());
        assert!(!dir.path().join(url_to_filename(album)).exists());
    }

    #[tokio::test]
    async fn test_member_that_failed_earlier_aborts_album() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad.png"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let album = "https://example.com/album/4";
        let bad = format!("{}/bad.png", server.uri());

        assert!(store.download(&bad, &HeaderMap::new()).await.is_err());

        let images = vec![AlbumImage::new(&bad)];
        let err = download_album(&store, album, &HeaderMap::new(), move || async move { Ok(images) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::AlbumMember { ref source, .. }
                if matches!(**source, MediaError::PreviouslyFailed { .. })
        ));
        assert!(!dir.path().join(url_to_filename(album)).exists());

        // Meeting the album again reports the failure instead of a gallery.
        let again = download_album(&store, album, &HeaderMap::new(), move || async move {
            Err(MediaError::malformed(album, "should not be listed"))
        })
        .await;
        assert!(matches!(
            settle(again).await,
            Err(MediaError::PreviouslyFailed { .. })
        ));
    }
}
