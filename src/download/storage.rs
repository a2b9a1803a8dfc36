//! On-disk helpers: resume checks and atomic writes.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Returns whether `path` is an existing regular file with at least one byte.
pub async fn is_existing_non_empty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

/// Writes `contents` to `path` without ever exposing a partial file there.
///
/// Data goes to a hidden `.part` sibling first and is renamed into place
/// once fully written and synced. The temporary file is removed on failure.
///
/// # Errors
///
/// Returns the underlying IO error from create, write, sync or rename.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_for(path);

    let result = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if result.is_err() {
        debug!(path = %temp_path.display(), "cleaning up partial file after error");
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "download".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.part"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_existing_non_empty() {
        let dir = TempDir::new().unwrap();
        let full = dir.path().join("full.pdf");
        let empty = dir.path().join("empty.pdf");
        std::fs::write(&full, b"%PDF").unwrap();
        std::fs::write(&empty, b"").unwrap();

        assert!(is_existing_non_empty(&full).await);
        assert!(!is_existing_non_empty(&empty).await);
        assert!(!is_existing_non_empty(&dir.path().join("absent.pdf")).await);
        assert!(!is_existing_non_empty(dir.path()).await);
    }

    #[tokio::test]
    async fn test_write_atomic_writes_contents_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.pdf");

        write_atomic(&path, b"contents").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"contents");
        assert!(!dir.path().join(".doc.pdf.part").exists());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"").unwrap();

        write_atomic(&path, b"new").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_write_atomic_missing_dir_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("doc.pdf");

        assert!(write_atomic(&path, b"x").await.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/out/pdfs/x.pdf")),
            PathBuf::from("/out/pdfs/.x.pdf.part")
        );
    }
}
