//! Test harness for integration tests against a booted [`vessel::Container`].
//!
//! Mirrors the teacher's `TestContext` fixture pattern (own temp dir, own
//! runtime, automatic cleanup on drop) so integration tests read the same
//! way regardless of which crate they're testing.

use tempfile::TempDir;

use vessel::{Container, VesselOptions, VesselResult};

/// An isolated, disposable container plus the temp directory backing its
/// persisted VFS. Keep this alive for the duration of a test; dropping it
/// removes the temp directory (the container itself should be torn down
/// explicitly via [`TestContainer::teardown`] first, since disposal is
/// async).
pub struct TestContainer {
    pub container: Container,
    _workdir: TempDir,
}

impl TestContainer {
    /// Boots a container persisted under a fresh temp directory.
    pub async fn boot() -> VesselResult<Self> {
        Self::boot_with(VesselOptions::new("vessel-test")).await
    }

    /// Boots a container with caller-supplied options, still redirecting
    /// `persist_path` into an owned temp directory.
    pub async fn boot_with(mut options: VesselOptions) -> VesselResult<Self> {
        let workdir = TempDir::new().expect("failed to create temp dir for test container");
        options.persist_path = Some(workdir.path().join("vessel.db"));
        let container = Container::boot(options).await?;
        Ok(Self { container, _workdir: workdir })
    }

    /// Boots an ephemeral, unpersisted container (no temp directory at all).
    pub async fn boot_ephemeral() -> VesselResult<Self> {
        let workdir = TempDir::new().expect("failed to create temp dir for test container");
        let options = VesselOptions::new("vessel-test-ephemeral");
        let container = Container::boot(options).await?;
        Ok(Self { container, _workdir: workdir })
    }

    pub async fn teardown(self) {
        self.container.teardown().await;
    }
}

/// Polls `f` every 10ms until it returns `true` or `timeout` elapses,
/// mirroring the busy-wait used by [`vessel::ProcessHandle::exit`] but
/// generalised for test assertions (e.g. waiting for a watcher event or a
/// process count to settle).
pub async fn wait_until<F: Fn() -> bool>(f: F, timeout: std::time::Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if f() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn boots_and_tears_down() {
        let ctx = TestContainer::boot().await.unwrap();
        ctx.container.fs().write_file("/hello.txt", b"hi".to_vec()).await.unwrap();
        let content = ctx.container.fs().read_file("/hello.txt").await.unwrap();
        assert_eq!(content, b"hi");
        ctx.teardown().await;
    }
}
