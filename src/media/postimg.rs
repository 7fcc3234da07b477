use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::Html;
use tracing::debug;

use super::album::{download_album, AlbumImage};
use super::traits::MediaSite;
use crate::error::MediaError;
use crate::html::for_each_link;
use crate::store::{url_to_filename, Store};

const SITE_BASE: &str = "https://postimg.cc";
const MEDIA_BASE: &str = "https://i.postimg.cc";

static BACKGROUND_IMAGE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"background-image:url\('([^']+)'\)").unwrap());

/// A gallery entry: the image's page link and its direct link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageLink {
    pub short_name: String,
    pub full_name: String,
}

impl ImageLink {
    #[must_use]
    pub fn is_populated(&self) -> bool {
        !self.short_name.is_empty() && !self.full_name.is_empty()
    }
}

/// Downloads postimg galleries.
///
/// Single postimg images are not recognised.
pub struct PostimgDownloader {
    store: Arc<Store>,
    gallery_prefix: String,
    media_prefix: String,
    headers: HeaderMap,
}

impl PostimgDownloader {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_base_urls(store, SITE_BASE, MEDIA_BASE)
    }

    #[must_use]
    pub fn with_base_urls(store: Arc<Store>, site_base: &str, media_base: &str) -> Self {
        Self {
            store,
            gallery_prefix: format!("{site_base}/gallery/"),
            media_prefix: format!("{media_base}/"),
            headers: HeaderMap::new(),
        }
    }

    fn is_gallery(&self, url: &str) -> bool {
        url.starts_with(&self.gallery_prefix)
    }

    async fn album_images(&self, album_url: &str) -> Result<Vec<AlbumImage>, MediaError> {
        let body = self.store.fetch(album_url, &self.headers).await?;
        let links = parse_gallery(&String::from_utf8_lossy(&body), &self.media_prefix);

        // Named after the page link so the file is stable even if the
        // direct link changes.
        Ok(links
            .into_iter()
            .map(|link| AlbumImage {
                filename: Some(url_to_filename(&link.short_name)),
                url: link.full_name,
            })
            .collect())
    }
}

#[async_trait]
impl MediaSite for PostimgDownloader {
    fn site_id(&self) -> &'static str {
        "postimg"
    }

    async fn download(&self, url: &str) -> Result<Option<String>, MediaError> {
        if !self.is_gallery(url) {
            return Ok(None);
        }
        debug!(url = %url, "resolving postimg gallery");

        let filename =
            download_album(&self.store, url, &self.headers, || self.album_images(url)).await?;
        Ok(Some(filename))
    }
}

/// Gallery entries in page order.
///
/// An entry is an anchor whose `style` sets a background image served from
/// `media_prefix`; its `href` is the image's page link.
#[must_use]
pub fn parse_gallery(html: &str, media_prefix: &str) -> Vec<ImageLink> {
    let doc = Html::parse_document(html);
    let mut links = Vec::new();

    for_each_link(&doc, |el| {
        let mut link = ImageLink::default();
        for (name, value) in el.attrs() {
            match name {
                "href" => link.short_name = value.to_string(),
                "style" => {
                    if let Some(full) = BACKGROUND_IMAGE
                        .captures(value)
                        .map(|c| c[1].to_string())
                        .filter(|full| full.starts_with(media_prefix))
                    {
                        link.full_name = full;
                    }
                }
                _ => {}
            }
        }

        if link.is_populated() {
            links.push(link);
        }
        Ok::<_, Infallible>(())
    })
    .unwrap_or_else(|never| match never {});

    links
}
