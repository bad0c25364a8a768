//! Local frame persistence: one directory per ring bucket, one file per frame

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::info;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Persistence collaborator for the frame ring. Listing must be ordered by
/// `frame_index` so a window replays in capture order.
#[async_trait]
pub trait FrameStore: Send + Sync {
    async fn write(
        &self,
        time_index: u32,
        frame_index: u32,
        payload: &[u8],
    ) -> Result<(), StorageError>;

    /// Drop every frame persisted in the bucket, leaving it empty.
    async fn clear_bucket(&self, time_index: u32) -> Result<(), StorageError>;

    /// Frame indices persisted in the bucket, ascending. A bucket never
    /// written to lists as empty.
    async fn list(&self, time_index: u32) -> Result<Vec<u32>, StorageError>;

    async fn read(&self, time_index: u32, frame_index: u32) -> Result<Vec<u8>, StorageError>;
}

/// Filesystem store: `root/<time_index>/<frame_index>.jpg`
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open the store, wiping any frames left over from a previous run.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if fs::metadata(&root).await.is_ok() {
            fs::remove_dir_all(&root).await?;
        }
        fs::create_dir_all(&root).await?;
        info!("Frame store ready at {}", root.display());
        Ok(Self { root })
    }

    fn bucket_dir(&self, time_index: u32) -> PathBuf {
        self.root.join(time_index.to_string())
    }

    fn frame_path(&self, time_index: u32, frame_index: u32) -> PathBuf {
        self.bucket_dir(time_index)
            .join(format!("{}.jpg", frame_index))
    }
}

#[async_trait]
impl FrameStore for DiskStore {
    async fn write(
        &self,
        time_index: u32,
        frame_index: u32,
        payload: &[u8],
    ) -> Result<(), StorageError> {
        fs::create_dir_all(self.bucket_dir(time_index)).await?;
        fs::write(self.frame_path(time_index, frame_index), payload).await?;
        Ok(())
    }

    async fn clear_bucket(&self, time_index: u32) -> Result<(), StorageError> {
        let dir = self.bucket_dir(time_index);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn list(&self, time_index: u32) -> Result<Vec<u32>, StorageError> {
        let dir = self.bucket_dir(time_index);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(index) = frame_index_of(&entry.path()) {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    async fn read(&self, time_index: u32, frame_index: u32) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(self.frame_path(time_index, frame_index)).await?)
    }
}

fn frame_index_of(path: &Path) -> Option<u32> {
    path.file_stem()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, DiskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path().join("frames")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn write_then_list_in_frame_order() {
        let (_dir, store) = store().await;
        // Out-of-order writes, plus enough entries to catch lexicographic
        // ordering mistakes (10 < 2 as strings).
        for i in [3u32, 0, 10, 2, 1] {
            store.write(5, i, &[i as u8]).await.unwrap();
        }
        assert_eq!(store.list(5).await.unwrap(), vec![0, 1, 2, 3, 10]);
        assert_eq!(store.read(5, 10).await.unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn cleared_bucket_holds_only_frames_written_after_the_clear() {
        let (_dir, store) = store().await;
        store.write(7, 0, b"old").await.unwrap();
        store.write(7, 1, b"old").await.unwrap();

        store.clear_bucket(7).await.unwrap();
        store.write(7, 0, b"new").await.unwrap();

        assert_eq!(store.list(7).await.unwrap(), vec![0]);
        assert_eq!(store.read(7, 0).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn missing_bucket_lists_empty() {
        let (_dir, store) = store().await;
        assert!(store.list(42).await.unwrap().is_empty());
        store.clear_bucket(42).await.unwrap();
    }

    #[tokio::test]
    async fn open_wipes_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("frames");

        let store = DiskStore::open(&root).await.unwrap();
        store.write(0, 0, b"stale").await.unwrap();
        drop(store);

        let store = DiskStore::open(&root).await.unwrap();
        assert!(store.list(0).await.unwrap().is_empty());
    }
}
