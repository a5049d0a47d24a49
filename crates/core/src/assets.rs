//! Scoped local asset handles.
//!
//! Binary payloads (an uploaded source video, a generated video) are
//! materialised as files inside an [`AssetStore`] directory.  Each file
//! is owned by exactly one [`LocalAsset`]; dropping the handle releases
//! the file.  An [`AssetSlot`] holds at most one asset and releases the
//! previous one whenever it is replaced or cleared, so repeated uploads
//! and generations never accumulate files.

use std::path::{Path, PathBuf};

/// What an asset represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    SourceVideo,
    GeneratedVideo,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceVideo => "source_video",
            Self::GeneratedVideo => "generated_video",
        }
    }
}

/// Directory that owns materialised asset files.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Use `root` as the asset directory, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to a fresh file and return the owning handle.
    ///
    /// `extension` is appended without a leading dot, e.g. `"mp4"`.
    pub async fn store(
        &self,
        kind: AssetKind,
        bytes: &[u8],
        extension: &str,
    ) -> std::io::Result<LocalAsset> {
        let file_name = format!("{}-{}.{extension}", kind.as_str(), uuid::Uuid::new_v4());
        let path = self.root.join(file_name);
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(
            kind = kind.as_str(),
            path = %path.display(),
            bytes = bytes.len(),
            "Asset stored",
        );

        Ok(LocalAsset {
            kind,
            path,
            byte_len: bytes.len() as u64,
            owned: true,
        })
    }
}

/// Handle to a single asset file.
///
/// Files written by an [`AssetStore`] are deleted when the handle is
/// dropped.  Handles created with [`LocalAsset::borrowed`] point at a
/// file the user supplied and never delete it.
#[derive(Debug)]
pub struct LocalAsset {
    kind: AssetKind,
    path: PathBuf,
    byte_len: u64,
    owned: bool,
}

impl LocalAsset {
    /// Reference a file the caller owns (e.g. the uploaded source video).
    pub async fn borrowed(kind: AssetKind, path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let meta = tokio::fs::metadata(&path).await?;
        Ok(Self {
            kind,
            path,
            byte_len: meta.len(),
            owned: false,
        })
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Copy the asset to `dest`, leaving this handle untouched.
    pub async fn export_to(&self, dest: &Path) -> std::io::Result<u64> {
        tokio::fs::copy(&self.path, dest).await
    }
}

impl Drop for LocalAsset {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(
                    kind = self.kind.as_str(),
                    path = %self.path.display(),
                    "Asset released",
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    kind = self.kind.as_str(),
                    path = %self.path.display(),
                    error = %e,
                    "Failed to release asset",
                );
            }
        }
    }
}

/// Holds at most one asset at a time.
#[derive(Debug, Default)]
pub struct AssetSlot {
    current: Option<LocalAsset>,
}

impl AssetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&LocalAsset> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Install `asset`, releasing whatever was held before.
    pub fn replace(&mut self, asset: LocalAsset) {
        // Assigning drops the previous handle, which releases its file.
        self.current = Some(asset);
    }

    /// Release the held asset, if any.
    pub fn clear(&mut self) {
        self.current = None;
    }
}
