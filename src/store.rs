//! Download store: maps remote URLs to files in the destination directory.
//!
//! Deduplication happens in two layers. A file already on disk is never
//! fetched again (this is what makes re-runs resume), and within one run a
//! URL is handed to at most one task. Every other task asking for the same
//! URL gets a [`PendingDownload`] that reports how the first attempt ended.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use reqwest::header::HeaderMap;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants::{FILENAME_MARKER, MAX_FILENAME_BODY};
use crate::error::MediaError;
use crate::fetch::Fetcher;

/// How the attempt at one URL ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    InFlight,
    Saved(String),
    Failed,
}

/// Describes the local copy of a remote media file.
///
/// When the file is not local, the description also holds this run's claim
/// on the URL. Dropping it without calling [`MediaDesc::saved_as`] records
/// the attempt as failed.
#[derive(Debug)]
pub struct MediaDesc {
    /// Relative to the destination directory.
    pub filename: String,
    /// True if the file has already been downloaded.
    pub is_local: bool,
    claim: Option<Claim>,
}

impl MediaDesc {
    /// Record that the media was saved as `filename` and return it.
    #[must_use]
    pub fn saved_as(mut self, filename: String) -> String {
        if let Some(claim) = self.claim.take() {
            claim.outcome.send_replace(Outcome::Saved(filename.clone()));
        }
        filename
    }
}

#[derive(Debug)]
struct Claim {
    outcome: watch::Sender<Outcome>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.outcome.send_if_modified(|outcome| {
            let in_flight = *outcome == Outcome::InFlight;
            if in_flight {
                *outcome = Outcome::Failed;
            }
            in_flight
        });
    }
}

/// Another task's attempt at a URL.
#[derive(Debug, Clone)]
pub struct PendingDownload {
    outcome: watch::Receiver<Outcome>,
}

impl PendingDownload {
    /// Wait for the attempt to end. Returns the saved filename, or `None`
    /// if the attempt failed.
    pub async fn wait(mut self) -> Option<String> {
        let outcome = self
            .outcome
            .wait_for(|outcome| *outcome != Outcome::InFlight)
            .await
            .ok()?
            .clone();
        match outcome {
            Outcome::Saved(filename) => Some(filename),
            Outcome::InFlight | Outcome::Failed => None,
        }
    }
}

/// Turn an [`MediaError::AlreadyAttempted`] result into the outcome of the
/// attempt it refers to; other results pass through.
///
/// # Errors
///
/// Returns [`MediaError::PreviouslyFailed`] if the earlier attempt failed,
/// and any other error unchanged.
pub async fn settle(result: Result<String, MediaError>) -> Result<String, MediaError> {
    match result {
        Err(MediaError::AlreadyAttempted { url, pending }) => pending
            .wait()
            .await
            .ok_or(MediaError::PreviouslyFailed { url }),
        other => other,
    }
}

/// Saves remote media into a destination directory.
pub struct Store {
    dest_dir: PathBuf,
    fetcher: Fetcher,
    cancel: CancellationToken,
    /// Media URLs handed out during this run, and how each attempt went.
    attempts: Mutex<HashMap<String, watch::Receiver<Outcome>>>,
}

impl Store {
    /// Create a store rooted at `dest_dir`. Fetches abort once `cancel` fires.
    #[must_use]
    pub fn new(dest_dir: impl Into<PathBuf>, fetcher: Fetcher, cancel: CancellationToken) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            fetcher,
            cancel,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Describe the local copy of `url` without downloading anything.
    ///
    /// If the file is not on disk, the caller becomes the one task allowed to
    /// download `url` in this run.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::AlreadyAttempted`] if the file is not on disk
    /// and `url` was already evaluated during this run.
    pub fn evaluate(&self, url: &str) -> Result<MediaDesc, MediaError> {
        let filename = url_to_filename(url);

        let dest_path = self.dest_dir.join(&filename);
        if dest_path.exists() {
            debug!(url = %url, path = %dest_path.display(), "skipping: file already exists");
            return Ok(MediaDesc {
                filename,
                is_local: true,
                claim: None,
            });
        }

        let claim = self.claim(url).map_err(|pending| MediaError::AlreadyAttempted {
            url: url.to_string(),
            pending,
        })?;

        Ok(MediaDesc {
            filename,
            is_local: false,
            claim: Some(claim),
        })
    }

    /// Ensure `url` has been downloaded and return its local filename.
    ///
    /// The file is saved as `filename` if given, otherwise under the name
    /// derived from `url`. Nothing is fetched if either file already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL was already attempted, the fetch fails, or
    /// the file cannot be written.
    pub async fn download_as(
        &self,
        url: &str,
        headers: &HeaderMap,
        filename: Option<&str>,
    ) -> Result<String, MediaError> {
        if let Some(name) = filename {
            if self.dest_dir.join(name).exists() {
                debug!(url = %url, file = %name, "skipping: file already exists");
                return Ok(name.to_string());
            }
        }

        let desc = self.evaluate(url)?;
        if desc.is_local {
            return Ok(desc.filename);
        }

        let body = self.fetch(url, headers).await?;

        let name = filename.map_or_else(|| desc.filename.clone(), str::to_string);
        self.save_file(&name, &body).await?;

        Ok(desc.saved_as(name))
    }

    /// [`Store::download_as`] under the derived filename.
    ///
    /// # Errors
    ///
    /// See [`Store::download_as`].
    pub async fn download(&self, url: &str, headers: &HeaderMap) -> Result<String, MediaError> {
        self.download_as(url, headers, None).await
    }

    /// Fetch `url` without saving it, honouring the run's cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Vec<u8>, MediaError> {
        Ok(self.fetcher.fetch(url, headers, &self.cancel).await?)
    }

    /// Write `contents` to `rel_path` under the destination directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save_file(&self, rel_path: &str, contents: &[u8]) -> Result<(), MediaError> {
        let dest_path = self.dest_dir.join(rel_path);
        info!(path = %dest_path.display(), "saving");
        tokio::fs::write(&dest_path, contents)
            .await
            .map_err(|source| MediaError::Save {
                path: dest_path,
                source,
            })
    }

    /// Claim `url` for the calling task, or hand back the existing attempt.
    fn claim(&self, url: &str) -> Result<Claim, PendingDownload> {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(outcome) = attempts.get(url) {
            return Err(PendingDownload {
                outcome: outcome.clone(),
            });
        }

        let (tx, rx) = watch::channel(Outcome::InFlight);
        attempts.insert(url.to_string(), rx);
        Ok(Claim { outcome: tx })
    }
}

/// Local filename used to save `url`.
///
/// Characters that are unsafe in filenames become `!`, runs of `!`
/// collapse, and the result carries [`FILENAME_MARKER`] as a prefix. Long
/// URLs are cut short and suffixed with a hash of the full URL.
#[must_use]
pub fn url_to_filename(url: &str) -> String {
    let mut body = String::with_capacity(url.len());
    for c in url.chars() {
        let c = if is_reserved(c) { '!' } else { c };
        if c == '!' && body.ends_with('!') {
            continue;
        }
        body.push(c);
    }

    let mut body = body.trim_matches(|c| c == '!' || c == ' ').to_string();

    if body.len() > MAX_FILENAME_BODY {
        let mut cut = MAX_FILENAME_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        body.push('-');
        body.push_str(&digest[..16]);
    }

    format!("{FILENAME_MARKER}{body}")
}

fn is_reserved(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}
