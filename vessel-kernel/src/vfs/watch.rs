//! Path-scoped watchers over the VFS event stream (design doc §3, Watcher;
//! §4.1).
//!
//! A watcher is just an [`EventBus`] subscription filtered down to a glob
//! set and projected to the public `{change, rename}` event kind. Glob
//! matching happens here rather than in the bus, since the bus has no
//! concept of "interested paths" and shouldn't.

use std::sync::Arc;

use glob::Pattern;
use tokio::sync::mpsc;

use crate::bus::{EventBus, KernelEvent, PublicEventKind};

/// A single delivered watch notification.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: PublicEventKind,
    pub path: String,
}

pub struct WatchFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl WatchFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, glob::PatternError> {
        let include = include.iter().map(|p| Pattern::new(p)).collect::<Result<_, _>>()?;
        let exclude = exclude.iter().map(|p| Pattern::new(p)).collect::<Result<_, _>>()?;
        Ok(Self { include, exclude })
    }

    fn matches(&self, path: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(path)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| p.matches(path))
    }
}

/// A live watcher; dropping it unsubscribes from the bus.
pub struct Watcher {
    _handle: crate::bus::SubscriptionHandle,
    rx: mpsc::Receiver<WatchEvent>,
}

impl Watcher {
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}

/// Starts watching `root` (a single path, or a path prefix the caller
/// intends as a subtree root) with the given include/exclude globs,
/// returning a [`Watcher`] that yields `{change, rename}` events.
///
/// A background task owns the raw bus subscription, applies the filter, and
/// forwards matching events to the watcher's own bounded channel, so a slow
/// consumer only ever lags its own stream rather than the shared bus.
pub fn watch(bus: &EventBus, root: String, filter: WatchFilter, buffer: usize) -> Watcher {
    let (handle, mut raw_rx) = bus.subscribe(buffer.max(1));
    let (tx, rx) = mpsc::channel(buffer.max(1));

    tokio::spawn(async move {
        while let Some(event) = raw_rx.recv().await {
            let KernelEvent::FileChange { kind, path } = event else {
                continue;
            };
            if !path_under(&root, &path) {
                continue;
            }
            if !filter.matches(&path) {
                continue;
            }
            let watch_event = WatchEvent { kind: kind.as_public(), path };
            if tx.send(watch_event).await.is_err() {
                break;
            }
        }
    });

    Watcher { _handle: handle, rx }
}

fn path_under(root: &str, path: &str) -> bool {
    if root == "/" {
        return true;
    }
    path == root || path.starts_with(&format!("{root}/"))
}

pub type SharedWatcher = Arc<tokio::sync::Mutex<Watcher>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FsEventKind;

    #[tokio::test]
    async fn watcher_filters_by_root_and_glob() {
        let bus = EventBus::new();
        let filter = WatchFilter::new(&["**/*.txt".to_string()], &[]).unwrap();
        let mut watcher = watch(&bus, "/dir".to_string(), filter, 8);

        bus.publish(KernelEvent::FileChange { kind: FsEventKind::Change, path: "/other/a.txt".into() });
        bus.publish(KernelEvent::FileChange { kind: FsEventKind::Change, path: "/dir/a.log".into() });
        bus.publish(KernelEvent::FileChange { kind: FsEventKind::AddFile, path: "/dir/a.txt".into() });

        let event = watcher.recv().await.unwrap();
        assert_eq!(event.path, "/dir/a.txt");
        assert_eq!(event.kind, PublicEventKind::Rename);
    }
}
