use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use super::album::{download_album, AlbumImage};
use super::traits::MediaSite;
use crate::error::MediaError;
use crate::store::Store;

const SITE_BASE: &str = "https://imgur.com";
const IMAGE_BASE: &str = "https://i.imgur.com";
const API_BASE: &str = "https://api.imgur.com";

const CLIENT_AUTHORIZATION: &str = "Client-ID ab1802d70cb1deb";

/// Album hashes and bare image ids are this long.
const ID_LEN: usize = 7;

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    data: Option<AlbumData>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    status: u16,
}

#[derive(Debug, Deserialize)]
struct AlbumData {
    #[serde(default)]
    images: Vec<AlbumImageInfo>,
}

#[derive(Debug, Deserialize)]
struct AlbumImageInfo {
    link: String,
}

/// What an imgur URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Album(String),
    Image(String),
}

/// Downloads imgur images and albums.
///
/// Albums are listed through the imgur API rather than by scraping.
pub struct ImgurDownloader {
    store: Arc<Store>,
    album_prefix: String,
    bare_prefix: String,
    image_prefix: String,
    api_album_prefix: String,
    headers: HeaderMap,
}

impl ImgurDownloader {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_base_urls(store, SITE_BASE, IMAGE_BASE, API_BASE)
    }

    /// Point the downloader at other hosts (mirrors, test servers).
    #[must_use]
    pub fn with_base_urls(store: Arc<Store>, site_base: &str, image_base: &str, api_base: &str) -> Self {
        Self {
            store,
            album_prefix: format!("{site_base}/a/"),
            bare_prefix: format!("{site_base}/"),
            image_prefix: format!("{image_base}/"),
            api_album_prefix: format!("{api_base}/3/album/"),
            headers: request_headers(),
        }
    }

    fn classify(&self, url: &str) -> Option<Target> {
        if url.starts_with(&self.album_prefix) {
            return Some(Target::Album(url.to_string()));
        }

        if url.starts_with(&self.image_prefix) {
            return Some(Target::Image(url.to_string()));
        }

        // Alternate image url format: https://imgur.com/<image_id>
        let image_id = url.strip_prefix(&self.bare_prefix)?;
        (image_id.len() == ID_LEN)
            .then(|| Target::Image(format!("{}{image_id}.jpeg", self.image_prefix)))
    }

    /// The 7-character hash identifying the album at `album_url`.
    fn album_hash(&self, album_url: &str) -> Result<String, MediaError> {
        let trimmed = album_url.strip_prefix(&self.album_prefix).unwrap_or(album_url);
        let len = trimmed.chars().count();
        if len < ID_LEN {
            return Err(MediaError::malformed(
                album_url,
                format!("imgur album hash length too short: have={len} want={ID_LEN} hash={trimmed}"),
            ));
        }

        let hash: String = trimmed.chars().skip(len - ID_LEN).collect();
        if len > ID_LEN {
            debug!(from = %trimmed, to = %hash, "removing imgur album prefix");
        }
        Ok(hash)
    }

    /// Ask the imgur API for the images of an album, in album order.
    async fn album_images(&self, album_url: &str) -> Result<Vec<AlbumImage>, MediaError> {
        debug!(url = %album_url, "scanning imgur album");

        let api_url = format!("{}{}", self.api_album_prefix, self.album_hash(album_url)?);
        let body = self.store.fetch(&api_url, &self.headers).await?;

        let response: AlbumResponse =
            serde_json::from_slice(&body).map_err(|source| MediaError::Decode {
                url: api_url.clone(),
                source,
            })?;

        if !response.success {
            return Err(MediaError::malformed(
                &api_url,
                format!("album info response has success=false status={}", response.status),
            ));
        }

        let data = response
            .data
            .ok_or_else(|| MediaError::malformed(&api_url, "album info response has no data"))?;

        Ok(data
            .images
            .into_iter()
            .map(|img| {
                debug!(link = %img.link, "detected imgur album image link");
                AlbumImage::new(img.link)
            })
            .collect())
    }
}

#[async_trait]
impl MediaSite for ImgurDownloader {
    fn site_id(&self) -> &'static str {
        "imgur"
    }

    async fn download(&self, url: &str) -> Result<Option<String>, MediaError> {
        let Some(target) = self.classify(url) else {
            return Ok(None);
        };
        debug!(url = %url, ?target, "resolving imgur link");

        let filename = match target {
            Target::Album(album_url) => {
                download_album(&self.store, &album_url, &self.headers, || {
                    self.album_images(&album_url)
                })
                .await?
            }
            Target::Image(image_url) => self.store.download(&image_url, &self.headers).await?,
        };
        Ok(Some(filename))
    }
}

fn request_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static(CLIENT_AUTHORIZATION));
    headers.insert(REFERER, HeaderValue::from_static("https://imgur.com/"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://imgur.com"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static("curl/7.84.0"));
    headers
}
