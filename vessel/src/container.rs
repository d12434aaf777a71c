//! The top-level embedding surface (design doc §6): boot a kernel, hand out
//! `fs()`/`spawn()`/`on()` handles to it, and tear it down.

use std::sync::Arc;

use vessel_kernel::bus::KernelEvent;
use vessel_kernel::net::NetworkManager;
use vessel_kernel::process::ProcessRegistry;
use vessel_kernel::vfs::VfsFacade;
use vessel_kernel::Kernel;
use vessel_shared::errors::VesselResult;

use crate::events::ContainerEvent;
use crate::metrics::{runtime_metrics_storage, ContainerMetrics};
use crate::mount;
use crate::options::{FsNode, VesselOptions};
use crate::process_client::{ProcessClient, SpawnArgs, ProcessHandle};
use crate::{fs_client::FsHandle, events::Watcher};

/// A booted sandboxed runtime: one VFS, one process table, one network
/// surface. The common case is in-process (this struct holds `Arc`s
/// straight to the kernel's facades); `vessel_kernel::bridge` carries the
/// same kernel over Unix/TCP/duplex transport for out-of-process attach.
pub struct Container {
    kernel: Arc<Kernel>,
    forward_preview_errors: bool,
}

impl Container {
    /// Boots a new container, installing `options.filesystem` at `/` once
    /// the kernel's VFS is ready.
    pub async fn boot(options: VesselOptions) -> VesselResult<Self> {
        let kernel_opts = options.to_kernel_options();
        let kernel = match Kernel::boot(kernel_opts).await {
            Ok(kernel) => kernel,
            Err(e) => {
                runtime_metrics_storage().record_boot_failure();
                return Err(e);
            }
        };

        if !options.filesystem.is_empty() {
            mount::install(&kernel.vfs, "/", &options.filesystem).await?;
        }

        runtime_metrics_storage().record_boot();
        tracing::info!(workdir = %options.workdir_name, "container booted");

        Ok(Self { kernel, forward_preview_errors: options.forward_preview_errors })
    }

    /// Filesystem handle, scoped to this container's VFS.
    pub fn fs(&self) -> FsHandle {
        FsHandle::new(self.kernel.vfs.clone())
    }

    /// Spawns `command args...` inside this container (script, builtin, or
    /// shell pipeline; see [`ProcessClient::spawn`]).
    pub async fn spawn(&self, command: &str, args: &[String], opts: SpawnArgs) -> VesselResult<ProcessHandle> {
        self.process_client().spawn(command, args, opts).await
    }

    /// Installs `tree` under `root` into the container's VFS (e.g. to add
    /// files after boot, outside the initial `filesystem` option).
    pub async fn mount(&self, root: &str, tree: &std::collections::BTreeMap<String, FsNode>) -> VesselResult<()> {
        mount::install(&self.kernel.vfs, root, tree).await
    }

    /// Walks `root` back out into an [`FsNode`] tree, the inverse of
    /// [`Container::mount`].
    pub async fn export(&self, root: &str) -> VesselResult<std::collections::BTreeMap<String, FsNode>> {
        mount::export(&self.kernel.vfs, root).await
    }

    /// Subscribes to container-level lifecycle events (`port`,
    /// `server_ready`, `preview_message`, `error`, `exit`). Errors are
    /// forwarded through this stream only when `forward_preview_errors`
    /// was set at boot.
    pub fn on(&self) -> ContainerEvents {
        let (handle, rx) = self.kernel.bus.subscribe(256);
        ContainerEvents { _handle: handle, rx, forward_preview_errors: self.forward_preview_errors }
    }

    /// Registers a VFS watcher scoped to `root`.
    pub fn watch(&self, root: impl Into<String>, include: &[String], exclude: &[String]) -> VesselResult<Watcher> {
        self.fs().watch(root, include, exclude)
    }

    /// Snapshot of every process this container has tracked (running or
    /// terminal), ordered by pid.
    pub fn processes(&self) -> Vec<crate::ProcessInfo> {
        self.kernel.registry.list()
    }

    /// Per-container operational metrics (commands executed, network
    /// counters), independent of the process-wide [`crate::metrics::runtime_metrics`].
    pub fn metrics(&self) -> ContainerMetrics {
        ContainerMetrics::snapshot(&self.kernel.registry, &self.kernel.net.metrics)
    }

    /// Tears the container down: closes network servers, kills every
    /// non-terminal process. Idempotent.
    pub async fn teardown(&self) {
        self.kernel.dispose().await;
        runtime_metrics_storage().record_dispose();
        tracing::info!("container torn down");
    }

    fn process_client(&self) -> ProcessClient {
        ProcessClient::new(self.kernel.vfs.clone(), self.kernel.net.clone(), self.kernel.registry.clone())
    }

    pub(crate) fn vfs(&self) -> Arc<VfsFacade> {
        self.kernel.vfs.clone()
    }

    pub(crate) fn net(&self) -> Arc<NetworkManager> {
        self.kernel.net.clone()
    }

    pub(crate) fn registry(&self) -> Arc<ProcessRegistry> {
        self.kernel.registry.clone()
    }
}

/// Stream of [`ContainerEvent`]s, returned by [`Container::on`]. Drop to
/// unsubscribe.
pub struct ContainerEvents {
    _handle: vessel_kernel::bus::SubscriptionHandle,
    rx: tokio::sync::mpsc::Receiver<KernelEvent>,
    forward_preview_errors: bool,
}

impl ContainerEvents {
    pub async fn recv(&mut self) -> Option<ContainerEvent> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(mapped) = self.project(event) {
                return Some(mapped);
            }
        }
    }

    fn project(&self, event: KernelEvent) -> Option<ContainerEvent> {
        match event {
            // The kernel has no separate "app inside the guest is actually
            // ready" signal beyond the listen itself, so `port` and
            // `server_ready` coincide here.
            KernelEvent::ServerListen { port, .. } => Some(ContainerEvent::Port { port }),
            KernelEvent::ServerClose { .. } => None,
            KernelEvent::ProcessExit { exit_code, .. } => Some(ContainerEvent::Exit { code: exit_code }),
            KernelEvent::ProcessError { message, .. } | KernelEvent::NetworkError { message, .. } => {
                if self.forward_preview_errors {
                    Some(ContainerEvent::Error { message })
                } else {
                    None
                }
            }
            KernelEvent::FileChange { .. } => None,
        }
    }
}
