//! bdfr media archiver library.
//!
//! Downloads media linked from the posts and comments of a bdfr archive
//! and rewrites the message bodies to point at the local copies.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod archive;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod fs_utils;
pub mod gallery;
pub mod html;
pub mod media;
pub mod process;
pub mod rewrite;
pub mod store;
