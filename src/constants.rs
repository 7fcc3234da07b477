//! Shared constants used across the application.

use std::time::Duration;

/// Prefix for every file this tool writes into the destination directory.
///
/// Keeps downloaded media from colliding with files that already belong to
/// the archive (e.g. reddit-hosted media copied over verbatim).
pub const FILENAME_MARKER: &str = "_bdfrmedia_";

/// Longest sanitized URL body kept verbatim in a derived filename.
pub const MAX_FILENAME_BODY: usize = 100;

/// Deadline for a single HTTP GET, connect through last byte.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for resolving one link found in a message body.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Link prefix used when rewriting message bodies.
pub const MEDIA_LINK_PREFIX: &str = "media/";
