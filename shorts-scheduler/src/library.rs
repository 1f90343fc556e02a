//! Finding the videos waiting to be published.

use eyre::Context;
use std::path::{Path, PathBuf};

/// Lists the files directly in `dir` whose extension is one of `extensions`, ignoring case.
///
/// The result is sorted by file name, which is the order they get published in.
/// Subdirectories are not searched.
pub async fn discover_videos(dir: &Path, extensions: &[String]) -> eyre::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("list {}", dir.display()))?;

    let mut videos = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("list {}", dir.display()))?
    {
        let path = entry.path();
        if !has_extension(&path, extensions) {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_file() {
            videos.push(path);
        }
    }

    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::debug!(dir = %dir.display(), count = videos.len(), "found videos");
    Ok(videos)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn exts() -> Vec<String> {
        vec!["mp4".to_string(), "mov".to_string()]
    }

    #[tokio::test]
    async fn filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.MP4", "a.mov", "c.mp4", "notes.txt", "d.mkv", "noext"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let found = discover_videos(dir.path(), &exts()).await.unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.mov", "b.MP4", "c.mp4"]);
    }

    #[tokio::test]
    async fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_videos(dir.path(), &exts()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_videos(&dir.path().join("nope"), &exts())
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("nope"), "{err}");
    }
}
