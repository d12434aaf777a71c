//! The VFS facade: the thin, externally-callable surface the bridge's `Fs`
//! service and the script executor's `fs` binding both call through.
//!
//! Kept separate from [`super::store::VfsStore`] so the store can stay
//! focused on the tree/persistence mechanics while this layer owns
//! request-shaped conveniences (default limits, watcher registration).

use std::path::PathBuf;
use std::sync::Arc;

use vessel_shared::constants::vfs::DEFAULT_RESULT_LIMIT;
use vessel_shared::errors::VesselResult;

use crate::bus::EventBus;

use super::store::{TextMatch, TextSearchParams, VfsStore};
use super::types::{FileHandle, FileMeta, OpenFlag};
use super::watch::{watch, WatchFilter, Watcher};

pub struct VfsFacade {
    store: Arc<VfsStore>,
    bus: EventBus,
}

impl VfsFacade {
    pub async fn new(persist_path: Option<PathBuf>, bus: EventBus) -> VesselResult<Self> {
        let store = VfsStore::open(persist_path.as_deref(), bus.clone()).await?;
        Ok(Self { store, bus })
    }

    pub async fn stat(&self, path: &str) -> VesselResult<FileMeta> {
        self.store.stat(path).await
    }

    pub async fn read_file(&self, path: &str) -> VesselResult<Vec<u8>> {
        self.store.read_file(path).await
    }

    pub async fn write_file(&self, path: &str, content: Vec<u8>) -> VesselResult<()> {
        self.store.write_file(path, content).await
    }

    pub async fn mkdir(&self, path: &str, recursive: bool) -> VesselResult<()> {
        self.store.mkdir(path, recursive).await
    }

    pub async fn unlink(&self, path: &str) -> VesselResult<()> {
        self.store.unlink(path).await
    }

    pub async fn rmdir(&self, path: &str, recursive: bool) -> VesselResult<()> {
        self.store.rmdir(path, recursive).await
    }

    pub async fn rename(&self, from: &str, to: &str) -> VesselResult<()> {
        self.store.rename(from, to).await
    }

    pub async fn readdir(&self, path: &str) -> VesselResult<Vec<FileMeta>> {
        self.store.readdir(path).await
    }

    pub async fn text_search(&self, query: &str, params: &TextSearchParams, limit: Option<u32>) -> VesselResult<Vec<TextMatch>> {
        let limit = limit.unwrap_or(DEFAULT_RESULT_LIMIT) as usize;
        self.store.text_search(query, params, limit).await
    }

    pub async fn open_file(&self, path: &str, flags: OpenFlag) -> VesselResult<FileHandle> {
        self.store.open_file(path, flags).await
    }

    pub async fn write_handle(&self, handle: FileHandle, data: Vec<u8>) -> VesselResult<()> {
        self.store.write_handle(handle, data).await
    }

    pub async fn sync(&self, handle: FileHandle) -> VesselResult<FileMeta> {
        self.store.sync(handle).await
    }

    pub async fn close_file(&self, handle: FileHandle) -> VesselResult<()> {
        self.store.close_file(handle).await
    }

    /// Registers a watcher scoped to `root` with the given include/exclude
    /// globs (design doc §3, Watcher `watchPaths`).
    pub fn watch(
        &self,
        root: String,
        include: &[String],
        exclude: &[String],
    ) -> Result<Watcher, glob::PatternError> {
        let filter = WatchFilter::new(include, exclude)?;
        Ok(watch(&self.bus, root, filter, 256))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn facade_round_trips_a_file() {
        let facade = VfsFacade::new(None, EventBus::new()).await.unwrap();
        facade.write_file("/a.txt", b"hi".to_vec()).await.unwrap();
        assert_eq!(facade.read_file("/a.txt").await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn facade_watch_delivers_change() {
        let facade = VfsFacade::new(None, EventBus::new()).await.unwrap();
        let mut watcher = facade.watch("/".to_string(), &[], &[]).unwrap();
        facade.write_file("/a.txt", b"hi".to_vec()).await.unwrap();
        let event = watcher.recv().await.unwrap();
        assert_eq!(event.path, "/a.txt");
    }
}
