//! Rewrites message bodies so media links point at the local copies.

use regex::Regex;
use tracing::{debug, error};
use url::Url;

use crate::constants::MEDIA_LINK_PREFIX;
use crate::error::MediaError;
use crate::media::MediaResolver;

static URL_PATTERN: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s<>"`\[\]{}|\\^]+"#).unwrap()
});

/// Characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ':', ';', '!', '?', '\'', '*'];

/// Every URL in `body`, once each, in order of first appearance.
#[must_use]
pub fn extract_urls(body: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in URL_PATTERN.find_iter(body) {
        let url = trim_url(m.as_str());
        let has_host = Url::parse(url).is_ok_and(|u| u.host().is_some());
        if has_host && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Drop trailing punctuation and closing parens that do not belong to the URL.
fn trim_url(candidate: &str) -> &str {
    let mut url = candidate;
    loop {
        if let Some(stripped) = url.strip_suffix(TRAILING_PUNCTUATION) {
            url = stripped;
        } else if url.ends_with(')') && url.matches(')').count() > url.matches('(').count() {
            url = &url[..url.len() - 1];
        } else {
            return url;
        }
    }
}

/// Point every occurrence of `link` in `body` at the local file `local`.
///
/// A markdown link wrapping `link` gets its target replaced. Otherwise the
/// raw URL is replaced by an HTML anchor that keeps the URL as its text.
#[must_use]
pub fn apply_local_link(body: &str, link: &str, local: &str) -> String {
    let md_link = format!("{MEDIA_LINK_PREFIX}{local}");

    let wrapped = format!("]({link})");
    if body.contains(&wrapped) {
        debug!(from = %link, to = %md_link, "replacing markdown link");
        return body.replace(&wrapped, &format!("]({md_link})"));
    }

    let raw_link = format!(r#"<a href="{md_link}">{link}</a>"#);
    debug!(from = %link, to = %raw_link, "replacing raw link");
    body.replace(link, &raw_link)
}

/// Save the media linked from `body` and return the rewritten body.
///
/// A link that fails is logged and left untouched; `message_id` labels the
/// log line.
///
/// # Errors
///
/// Only local I/O failures are returned.
pub async fn rewrite_body(
    resolver: &MediaResolver,
    body: &str,
    message_id: &str,
) -> Result<String, MediaError> {
    let mut body = body.to_string();

    for link in extract_urls(&body) {
        let local = match resolver.resolve(&link).await {
            Ok(Some(local)) => local,
            // Don't know how to save this link to disk. Ignore.
            Ok(None) => continue,
            Err(e) if e.is_fatal() => return Err(e),
            // Already logged by the task that tried it first.
            Err(MediaError::PreviouslyFailed { .. }) => {
                debug!(url = %link, message = %message_id, "skipping link that failed earlier");
                continue;
            }
            Err(e) => {
                error!(url = %link, message = %message_id, error = %e, "failed to save link");
                continue;
            }
        };

        body = apply_local_link(&body, &link, &local);
    }

    Ok(body)
}
