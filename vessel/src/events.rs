//! Outer-facing event surface (design doc §6, `container.on(event, listener)`).

use vessel_kernel::bus::PublicEventKind;
use vessel_kernel::vfs::WatchEvent as KernelWatchEvent;

/// A file-change notification delivered to a watcher (design doc §3,
/// Watcher, public projection).
#[derive(Debug, Clone)]
pub struct FileEvent {
    pub kind: PublicEventKind,
    pub path: String,
}

impl From<KernelWatchEvent> for FileEvent {
    fn from(e: KernelWatchEvent) -> Self {
        Self { kind: e.kind, path: e.path }
    }
}

/// A live watcher handle; call [`Watcher::recv`] in a loop, or drop it to
/// unsubscribe.
pub struct Watcher {
    inner: vessel_kernel::vfs::Watcher,
}

impl Watcher {
    pub(crate) fn new(inner: vessel_kernel::vfs::Watcher) -> Self {
        Self { inner }
    }

    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.inner.recv().await.map(FileEvent::from)
    }
}

/// Container-level lifecycle/diagnostic events (`port, server_ready,
/// preview_message, error, code`).
#[derive(Debug, Clone)]
pub enum ContainerEvent {
    Port { port: u16 },
    ServerReady { port: u16 },
    PreviewMessage { message: String },
    Error { message: String },
    Exit { code: i32 },
}
