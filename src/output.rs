//! Writing fetched content to a file
//!
//! Content is copied into `<path>.tmp`, synced, then renamed over `path`, so
//! readers of `path` only ever see a complete version.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::{FetcherError, Result};

/// Sibling path used while a write is in progress
pub fn temp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.tmp", path.display()))
}

/// Copy `reader` to `path` through a temp file and rename.
///
/// Creates missing parent directories. On a read or write error the temp
/// file is removed and any existing file at `path` is left untouched.
pub async fn write_atomic<R>(reader: &mut R, path: &Path) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    let written = match tokio::io::copy(reader, &mut file).await {
        Ok(written) => written,
        Err(e) => {
            drop(file);
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(FetcherError::Io(e));
        }
    };
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;
    tracing::debug!("Wrote {} bytes to {}", written, path.display());
    Ok(written)
}

/// Copy `reader` to stdout and flush
pub async fn write_stdout<R>(reader: &mut R) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut stdout = tokio::io::stdout();
    let written = tokio::io::copy(reader, &mut stdout).await?;
    stdout.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::tempdir;
    use tokio::io::ReadBuf;

    /// Yields some bytes, then fails
    struct BrokenTransfer {
        sent: bool,
    }

    impl AsyncRead for BrokenTransfer {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_atomic_creates_file_and_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feeds").join("latest.json");

        let written = write_atomic(&mut &b"{\"v\":1}"[..], &path).await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"v\":1}");
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_previous_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latest.json");

        write_atomic(&mut &b"first version"[..], &path).await.unwrap();
        write_atomic(&mut &b"v2"[..], &path).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_failed_copy_keeps_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latest.json");
        write_atomic(&mut &b"good"[..], &path).await.unwrap();

        let err = write_atomic(&mut BrokenTransfer { sent: false }, &path)
            .await
            .unwrap_err();

        assert!(matches!(err, FetcherError::Io(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"good");
        assert!(!temp_path(&path).exists());
    }
}
