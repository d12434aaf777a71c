//! Event bus: the typed pub/sub backbone used by VFS watchers and process
//! lifecycle notifications.
//!
//! The design doc asks for two properties that `tokio::sync::broadcast`
//! doesn't give us directly: insertion-order fan-out, and "a throwing
//! handler must not stop delivery to the rest". We get both by keeping an
//! explicit ordered list of subscriber channels rather than relying on the
//! broadcast channel's internal ring buffer, and by treating a subscriber
//! whose receiver has been dropped (the async equivalent of "the callback
//! threw and the watcher was torn down") as something to skip, not abort on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A single kernel-wide event, typed broadly enough to carry both VFS
/// change notifications and process lifecycle notifications. Consumers
/// (the watcher registry, the bridge's Events service) filter by variant.
#[derive(Debug, Clone)]
pub enum KernelEvent {
    FileChange { kind: FsEventKind, path: String },
    ProcessExit { pid: u32, exit_code: i32 },
    ProcessError { pid: u32, message: String },
    ServerListen { port: u16, server_type: String, owner_pid: u32 },
    ServerClose { port: u16, server_type: String },
    NetworkError { port: u16, message: String },
}

/// The richer watch-paths event set (design doc §3, Watcher; §9 open
/// question resolution: always emit this set internally and project down to
/// `change | rename` at the public `watch()` boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Change,
    AddFile,
    RemoveFile,
    AddDir,
    RemoveDir,
    UpdateDirectory,
}

impl FsEventKind {
    /// Projection used by the public `watch(path, cb)` API, which only
    /// knows about `change` and `rename`.
    pub fn as_public(self) -> PublicEventKind {
        match self {
            FsEventKind::Change | FsEventKind::UpdateDirectory => PublicEventKind::Change,
            FsEventKind::AddFile
            | FsEventKind::RemoveFile
            | FsEventKind::AddDir
            | FsEventKind::RemoveDir => PublicEventKind::Rename,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicEventKind {
    Change,
    Rename,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<KernelEvent>,
}

/// Ordered, best-effort pub/sub bus.
///
/// `publish` delivers to every live subscriber in the order they
/// subscribed. A subscriber whose channel is full or closed is dropped from
/// the list on the next publish rather than blocking or panicking the
/// publisher.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<Subscriber>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new subscriber, returning its handle and receiver.
    pub fn subscribe(&self, buffer: usize) -> (SubscriptionHandle, mpsc::Receiver<KernelEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.inner.lock().push(Subscriber { id, tx });
        (
            SubscriptionHandle {
                id,
                bus: self.inner.clone(),
            },
            rx,
        )
    }

    /// Publish one event to every live subscriber, in subscription order.
    /// Subscribers with a full or closed channel are pruned; pruning never
    /// aborts delivery to the remaining subscribers.
    pub fn publish(&self, event: KernelEvent) {
        let mut subs = self.inner.lock();
        subs.retain(|s| match s.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subscriber = s.id, "event bus subscriber lagging, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Dropping this handle unregisters the subscriber; mirrors `watch().close()`.
pub struct SubscriptionHandle {
    id: u64,
    bus: Arc<Mutex<Vec<Subscriber>>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.bus.lock().retain(|s| s.id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_subscription_order() {
        let bus = EventBus::new();
        let (_h1, mut rx1) = bus.subscribe(8);
        let (_h2, mut rx2) = bus.subscribe(8);

        bus.publish(KernelEvent::FileChange {
            kind: FsEventKind::Change,
            path: "/a".into(),
        });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, KernelEvent::FileChange { .. }));
        assert!(matches!(e2, KernelEvent::FileChange { .. }));
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_break_others() {
        let bus = EventBus::new();
        let (h1, rx1) = bus.subscribe(8);
        let (_h2, mut rx2) = bus.subscribe(8);
        drop(h1);
        drop(rx1);

        bus.publish(KernelEvent::ProcessExit { pid: 1, exit_code: 0 });
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e2, KernelEvent::ProcessExit { pid: 1, .. }));
    }
}
