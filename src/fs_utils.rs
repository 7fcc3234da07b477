use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Whether `path` names a post file.
fn is_post_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Recursively copy every non-post file under `src` to the same relative
/// path under `dst`.
///
/// `dst` is created if missing. When `dst` lies inside `src` its subtree is
/// skipped.
///
/// # Errors
///
/// Returns the first directory that cannot be read or created, or the first
/// file that cannot be copied.
pub async fn copy_non_post_files(src: &Path, dst: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dst)
        .await
        .with_context(|| format!("Failed to create destination directory: {}", dst.display()))?;

    let src = tokio::fs::canonicalize(src)
        .await
        .with_context(|| format!("Failed to resolve source directory: {}", src.display()))?;
    let dst = tokio::fs::canonicalize(dst)
        .await
        .with_context(|| format!("Failed to resolve destination directory: {}", dst.display()))?;

    let mut copied = 0;
    // Async recursion is not allowed without boxing; use an explicit stack.
    let mut stack = vec![(src, dst.clone())];

    while let Some((src_dir, dst_dir)) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&src_dir)
            .await
            .with_context(|| format!("Failed to read directory: {}", src_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let src_path = entry.path();
            let dst_path = dst_dir.join(entry.file_name());
            let file_type = entry.file_type().await?;

            if src_path.starts_with(&dst) {
                debug!(path = %src_path.display(), "Skipping destination subtree");
                continue;
            }

            if file_type.is_dir() {
                tokio::fs::create_dir_all(&dst_path).await.with_context(|| {
                    format!("Failed to create directory: {}", dst_path.display())
                })?;
                stack.push((src_path, dst_path));
                continue;
            }

            if file_type.is_file() && !is_post_file(&src_path) {
                tokio::fs::copy(&src_path, &dst_path)
                    .await
                    .with_context(|| format!("Failed to copy file: {}", src_path.display()))?;
                copied += 1;
            }
        }
    }

    debug!(files = copied, "Copied non-post files");
    Ok(copied)
}

/// Names of the post files directly inside `src`, sorted.
///
/// # Errors
///
/// Returns an error if `src` cannot be read.
pub async fn collect_post_filenames(src: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(src)
        .await
        .with_context(|| format!("Failed to read directory: {}", src.display()))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_post_file(&path) {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copies_non_post_files_preserving_paths() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("post.json"), "{}").unwrap();
        std::fs::write(src.path().join("cat.jpg"), "meow").unwrap();
        std::fs::create_dir_all(src.path().join("sub/deeper")).unwrap();
        std::fs::write(src.path().join("sub/deeper/dog.png"), "woof").unwrap();
        std::fs::write(src.path().join("sub/nested.json"), "{}").unwrap();

        let copied = copy_non_post_files(src.path(), dst.path()).await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(std::fs::read(dst.path().join("cat.jpg")).unwrap(), b"meow");
        assert_eq!(
            std::fs::read(dst.path().join("sub/deeper/dog.png")).unwrap(),
            b"woof"
        );
        assert!(!dst.path().join("post.json").exists());
        assert!(!dst.path().join("sub/nested.json").exists());
    }

    #[tokio::test]
    async fn test_destination_inside_source_is_skipped() {
        let src = tempfile::tempdir().unwrap();
        let dst = src.path().join("out");

        std::fs::write(src.path().join("cat.jpg"), "meow").unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(dst.join("old.jpg"), "old").unwrap();

        copy_non_post_files(src.path(), &dst).await.unwrap();

        assert_eq!(std::fs::read(dst.join("cat.jpg")).unwrap(), b"meow");
        assert!(!dst.join("out").exists());
    }

    #[tokio::test]
    async fn test_creates_missing_destination() {
        let src = tempfile::tempdir().unwrap();
        let parent = tempfile::tempdir().unwrap();
        let dst = parent.path().join("a/b");

        std::fs::write(src.path().join("x.gif"), "gif").unwrap();
        copy_non_post_files(src.path(), &dst).await.unwrap();

        assert!(dst.join("x.gif").exists());
    }

    #[tokio::test]
    async fn test_collect_post_filenames_top_level_only() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("b.json"), "{}").unwrap();
        std::fs::write(src.path().join("a.json"), "{}").unwrap();
        std::fs::write(src.path().join("c.jpg"), "").unwrap();
        std::fs::create_dir_all(src.path().join("d.json")).unwrap();
        std::fs::create_dir_all(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("sub/e.json"), "{}").unwrap();

        let names = collect_post_filenames(src.path()).await.unwrap();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }
}
