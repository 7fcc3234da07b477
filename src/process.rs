//! Post processing: rewrite every post in the source directory into the
//! destination directory, a bounded number at a time.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Context, Result};
use futures_util::{stream, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive::{read_post, write_post, Post};
use crate::config::Config;
use crate::error::MediaError;
use crate::media::MediaResolver;
use crate::rewrite::rewrite_body;

/// Process each post file, `config.jobs` at a time.
///
/// The first failure cancels `cancel`, stops posts that have not started,
/// and is returned. Returns the number of posts written.
///
/// # Errors
///
/// Returns the first post that could not be read, processed or written.
pub async fn process_files(
    config: &Config,
    resolver: &MediaResolver,
    filenames: Vec<String>,
    cancel: &CancellationToken,
) -> Result<usize> {
    let written = AtomicUsize::new(0);

    let result = stream::iter(filenames.into_iter().map(Ok))
        .try_for_each_concurrent(config.jobs, |filename| {
            let written = &written;
            async move {
                if cancel.is_cancelled() {
                    bail!("processing cancelled before {filename}");
                }
                process_file(config, resolver, &filename, cancel).await?;
                written.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        })
        .await;

    if result.is_err() {
        cancel.cancel();
    }
    result?;

    let written = written.into_inner();
    info!(posts = written, "processed posts");
    Ok(written)
}

/// Read one post from the source directory, localize its media and write
/// it to the destination directory under the same name.
///
/// # Errors
///
/// Returns an error if the post cannot be read or written, or if saving
/// media hits a local I/O failure.
pub async fn process_file(
    config: &Config,
    resolver: &MediaResolver,
    filename: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut post = read_post(&config.source.join(filename)).await?;

    debug!(file = %filename, "processing post");
    process_post(resolver, &mut post)
        .await
        .with_context(|| format!("failed to process post {filename}"))?;

    // Links resolved after cancellation were skipped; don't persist that.
    if cancel.is_cancelled() {
        bail!("processing cancelled during {filename}");
    }

    write_post(&config.dest_dir.join(filename), &post).await?;
    Ok(())
}

/// Rewrite the post's selftext and every comment body, in archive order.
///
/// # Errors
///
/// Returns the first local I/O failure; link failures are only logged.
pub async fn process_post(resolver: &MediaResolver, post: &mut Post) -> Result<(), MediaError> {
    let post_id = post.id().unwrap_or("?").to_string();

    for body in post.bodies_mut() {
        let message_id = match body.id {
            Some(id) if id != post_id => format!("{post_id}/{id}"),
            _ => post_id.clone(),
        };
        let rewritten = rewrite_body(resolver, body.text.as_str(), &message_id).await?;
        *body.text = rewritten;
    }

    Ok(())
}
