use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use scraper::Html;
use tracing::debug;

use super::album::{download_album, AlbumImage};
use super::traits::MediaSite;
use crate::error::MediaError;
use crate::html::embedded_image_urls;
use crate::store::{settle, Store};

const SITE_BASE: &str = "https://ibb.co";

/// Only images served over https are taken from imgbb pages.
const SECURE_IMAGE_PREFIX: &str = "https://";

/// What an imgbb URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Album(String),
    Page(String),
}

/// Downloads imgbb albums and single-image pages.
///
/// imgbb has no public API; both shapes are scraped from the page HTML.
pub struct ImgbbDownloader {
    store: Arc<Store>,
    album_prefix: String,
    page_prefix: String,
    image_prefix: String,
    headers: HeaderMap,
}

impl ImgbbDownloader {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_base_urls(store, SITE_BASE, SECURE_IMAGE_PREFIX)
    }

    /// Point the downloader at another host. Embedded images are only
    /// taken when their URL starts with `image_prefix`.
    #[must_use]
    pub fn with_base_urls(store: Arc<Store>, site_base: &str, image_prefix: &str) -> Self {
        Self {
            store,
            album_prefix: format!("{site_base}/album/"),
            page_prefix: format!("{site_base}/"),
            image_prefix: image_prefix.to_string(),
            headers: HeaderMap::new(),
        }
    }

    fn classify(&self, url: &str) -> Option<Target> {
        if url.starts_with(&self.album_prefix) {
            return Some(Target::Album(url.to_string()));
        }
        url.strip_prefix(&self.page_prefix)
            .filter(|rest| !rest.is_empty())
            .map(|_| Target::Page(url.to_string()))
    }

    async fn album_images(&self, album_url: &str) -> Result<Vec<AlbumImage>, MediaError> {
        let body = self.store.fetch(album_url, &self.headers).await?;
        let urls = image_urls(&body, &self.image_prefix);
        if urls.is_empty() {
            return Err(MediaError::malformed(
                album_url,
                "imgbb album contains 0 embedded image urls",
            ));
        }
        Ok(urls.into_iter().map(AlbumImage::new).collect())
    }

    /// Save the one image shown on an imgbb page, named after the page.
    async fn download_page(&self, page_url: &str) -> Result<String, MediaError> {
        let desc = self.store.evaluate(page_url)?;
        if desc.is_local {
            return Ok(desc.filename);
        }

        let body = self.store.fetch(page_url, &self.headers).await?;
        let image_url = single_image_url(page_url, &body, &self.image_prefix)?;

        let saved = settle(
            self.store
                .download_as(&image_url, &self.headers, Some(&desc.filename))
                .await,
        )
        .await?;
        Ok(desc.saved_as(saved))
    }
}

#[async_trait]
impl MediaSite for ImgbbDownloader {
    fn site_id(&self) -> &'static str {
        "imgbb"
    }

    async fn download(&self, url: &str) -> Result<Option<String>, MediaError> {
        let Some(target) = self.classify(url) else {
            return Ok(None);
        };
        debug!(url = %url, ?target, "resolving imgbb link");

        let filename = match target {
            Target::Album(album_url) => {
                download_album(&self.store, &album_url, &self.headers, || {
                    self.album_images(&album_url)
                })
                .await?
            }
            Target::Page(page_url) => self.download_page(&page_url).await?,
        };
        Ok(Some(filename))
    }
}

/// Embedded image URLs starting with `prefix`, in page order.
fn image_urls(body: &[u8], prefix: &str) -> Vec<String> {
    let doc = Html::parse_document(&String::from_utf8_lossy(body));
    embedded_image_urls(&doc)
        .into_iter()
        .filter(|url| url.starts_with(prefix))
        .collect()
}

/// The image on a single-image page. Zero or several images is an error.
fn single_image_url(page_url: &str, body: &[u8], prefix: &str) -> Result<String, MediaError> {
    let mut urls = image_urls(body, prefix).into_iter();
    let first = urls
        .next()
        .ok_or_else(|| MediaError::malformed(page_url, "imgbb page lacks image link"))?;
    if let Some(second) = urls.next() {
        return Err(MediaError::malformed(
            page_url,
            format!("imgbb page contains multiple image links: first={first} second={second}"),
        ));
    }
    Ok(first)
}
