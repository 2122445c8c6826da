//! Where the player gets raw audio bytes from.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use flux_core::{Error, Result, Track};
use tracing::debug;

/// Supplies the encoded bytes of a track.
#[async_trait]
pub trait ByteProvider: Send + Sync {
    async fn read(&self, track: &Track) -> Result<Bytes>;
}

/// Reads tracks from the local file system.
///
/// Relative file names are resolved against the library root, if one is set.
#[derive(Debug, Clone, Default)]
pub struct FileByteProvider {
    root: Option<PathBuf>,
}

impl FileByteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn resolve(&self, track: &Track) -> PathBuf {
        match &self.root {
            Some(root) => root.join(track.file_name()),
            None => track.file_name().to_path_buf(),
        }
    }
}

#[async_trait]
impl ByteProvider for FileByteProvider {
    async fn read(&self, track: &Track) -> Result<Bytes> {
        let path = self.resolve(track);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!("Read {} bytes from {}", data.len(), path.display());
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("song.flac"), b"fLaC").unwrap();

        let provider = FileByteProvider::with_root(dir.path());
        let data = provider.read(&Track::new("Song", "song.flac")).await.unwrap();
        assert_eq!(&data[..], b"fLaC");
    }

    #[tokio::test]
    async fn test_absolute_path_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let provider = FileByteProvider::new();
        assert!(provider.root().is_none());
        let data = provider.read(&Track::new("A", &path)).await.unwrap();
        assert_eq!(data.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileByteProvider::with_root(dir.path());

        let err = provider.read(&Track::new("Gone", "gone.mp3")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref p) if p.ends_with("gone.mp3")));
        assert!(err.is_playback_failure());
    }

    #[tokio::test]
    async fn test_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileByteProvider::new();

        let err = provider
            .read(&Track::new("Dir", dir.path()))
            .await
            .unwrap_err();
        assert!(err.is_playback_failure());
    }
}
