//! Outer-facing filesystem handle (design doc §6, `container.fs()`).
//!
//! Thin async wrapper over the kernel's VFS facade. In the single-process
//! embedding the container and kernel share the same address space, so this
//! calls straight through via the shared `Arc` rather than round-tripping
//! an RPC to itself; the bridge (`vessel_kernel::bridge`) exists for the
//! out-of-process case (CLI, test harness attaching to a running kernel),
//! not as a mandatory hop for in-process calls.

use std::sync::Arc;

use vessel_kernel::vfs::{FileHandle, FileMeta, OpenFlag, TextMatch, TextSearchParams, VfsFacade};
use vessel_shared::errors::VesselResult;

#[derive(Clone)]
pub struct FsHandle {
    vfs: Arc<VfsFacade>,
}

impl FsHandle {
    pub(crate) fn new(vfs: Arc<VfsFacade>) -> Self {
        Self { vfs }
    }

    pub async fn stat(&self, path: &str) -> VesselResult<FileMeta> {
        self.vfs.stat(path).await
    }

    pub async fn read_file(&self, path: &str) -> VesselResult<Vec<u8>> {
        self.vfs.read_file(path).await
    }

    pub async fn write_file(&self, path: &str, content: impl Into<Vec<u8>>) -> VesselResult<()> {
        self.vfs.write_file(path, content.into()).await
    }

    pub async fn mkdir(&self, path: &str, recursive: bool) -> VesselResult<()> {
        self.vfs.mkdir(path, recursive).await
    }

    pub async fn unlink(&self, path: &str) -> VesselResult<()> {
        self.vfs.unlink(path).await
    }

    pub async fn rmdir(&self, path: &str, recursive: bool) -> VesselResult<()> {
        self.vfs.rmdir(path, recursive).await
    }

    pub async fn rename(&self, from: &str, to: &str) -> VesselResult<()> {
        self.vfs.rename(from, to).await
    }

    pub async fn readdir(&self, path: &str) -> VesselResult<Vec<FileMeta>> {
        self.vfs.readdir(path).await
    }

    pub async fn text_search(&self, query: &str, params: &TextSearchParams, limit: Option<u32>) -> VesselResult<Vec<TextMatch>> {
        self.vfs.text_search(query, params, limit).await
    }

    pub async fn open_file(&self, path: &str, flags: OpenFlag) -> VesselResult<FileHandle> {
        self.vfs.open_file(path, flags).await
    }

    pub async fn write_handle(&self, handle: FileHandle, data: impl Into<Vec<u8>>) -> VesselResult<()> {
        self.vfs.write_handle(handle, data.into()).await
    }

    pub async fn sync(&self, handle: FileHandle) -> VesselResult<FileMeta> {
        self.vfs.sync(handle).await
    }

    pub async fn close_file(&self, handle: FileHandle) -> VesselResult<()> {
        self.vfs.close_file(handle).await
    }

    /// Registers a watcher scoped to `root`, mirroring `watchPaths` from
    /// the design doc (§3, Watcher) at the public `{change, rename}` level.
    pub fn watch(&self, root: impl Into<String>, include: &[String], exclude: &[String]) -> VesselResult<crate::events::Watcher> {
        let watcher = self
            .vfs
            .watch(root.into(), include, exclude)
            .map_err(|e| vessel_shared::errors::VesselError::Config(e.to_string()))?;
        Ok(crate::events::Watcher::new(watcher))
    }
}
