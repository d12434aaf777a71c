//! Container Kernel: the async factory that wires every subsystem together
//! and owns the dispose order (design doc §4.8).
//!
//! Boot is three phases: (1) start VFS, process registry, and network
//! manager construction so their independent work overlaps; (2) await all
//! of them; (3) wire the cross-dependencies (network manager is already
//! independent of the others in this design, but the script executor and
//! bridge both need every handle) and validate nothing is missing before
//! the kernel becomes observable. No partially-built kernel is ever handed
//! back to a caller.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vessel_shared::errors::{VesselError, VesselResult};

use crate::bus::EventBus;
use crate::net::NetworkManager;
use crate::process::ProcessRegistry;
use crate::vfs::VfsFacade;

/// Options controlling how a [`Kernel`] boots (design doc §6, `BootOptions`).
#[derive(Clone, Debug, Default)]
pub struct BootOptions {
    pub workdir_name: String,
    pub persist_path: Option<PathBuf>,
}

impl BootOptions {
    /// Validates `workdir_name`: no path separators, no `.`/`..` segments,
    /// matching the teacher's `home_dir` validation (`EINVAL`-style config
    /// rejection rather than silently sanitising the input).
    pub fn validate(&self) -> VesselResult<()> {
        if self.workdir_name.is_empty() {
            return Err(VesselError::Config("workdir_name must not be empty".into()));
        }
        if self.workdir_name.contains('/') || self.workdir_name.contains('\\') {
            return Err(VesselError::Config("workdir_name must not contain path separators".into()));
        }
        if self.workdir_name == "." || self.workdir_name == ".." {
            return Err(VesselError::Config("workdir_name must not be '.' or '..'".into()));
        }
        Ok(())
    }
}

/// The kernel aggregate: VFS, process registry, network manager, and the
/// event bus all of them publish to. At most one is ever live per bridge;
/// see [`Kernel::boot`]'s singleton guard.
pub struct Kernel {
    pub vfs: Arc<VfsFacade>,
    pub registry: Arc<ProcessRegistry>,
    pub net: Arc<NetworkManager>,
    pub bus: EventBus,
    disposed: AtomicBool,
}

/// Global at-most-one-container-per-bridge guard (design doc §4.8,
/// singleton guard). A second `boot` while one is live fails with `EEXIST`;
/// this is the only ambient global state the kernel keeps.
static BOOTING: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());
static LIVE: AtomicBool = AtomicBool::new(false);

impl Kernel {
    pub async fn boot(options: BootOptions) -> VesselResult<Arc<Self>> {
        options.validate()?;

        let _guard = BOOTING.lock().await;
        if LIVE.swap(true, Ordering::SeqCst) {
            return Err(VesselError::Config("a kernel is already booted for this bridge".into()));
        }

        match Self::boot_inner(options).await {
            Ok(kernel) => Ok(kernel),
            Err(e) => {
                LIVE.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn boot_inner(options: BootOptions) -> VesselResult<Arc<Self>> {
        let bus = EventBus::new();

        let vfs_fut = VfsFacade::new(options.persist_path.clone(), bus.clone());
        let registry = ProcessRegistry::new(bus.clone());
        let net = NetworkManager::new(bus.clone());

        let vfs = vfs_fut.await?;
        registry.bind_network(net.clone());

        Ok(Arc::new(Self {
            vfs: Arc::new(vfs),
            registry,
            net,
            bus,
            disposed: AtomicBool::new(false),
        }))
    }

    /// Dispose order (design doc §4.8): terminate every process (which
    /// cascades each one's virtual servers closed via the registry's network
    /// binding), then sweep any server left with no owning process, flush
    /// VFS events (the bus has no buffer to flush beyond letting pending
    /// sends complete, which dropping subscribers naturally does), close the
    /// bridge. Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.kill_all();
        for server in self.net.list_servers() {
            let _ = self.net.close(server.port);
        }
        LIVE.store(false, Ordering::SeqCst);
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Kernel>;
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn boot_options_reject_path_separators() {
        let opts = BootOptions { workdir_name: "a/b".into(), persist_path: None };
        assert!(opts.validate().is_err());
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let kernel = Kernel::boot(BootOptions { workdir_name: "dispose-test".into(), persist_path: None })
            .await
            .unwrap();
        kernel.dispose().await;
        kernel.dispose().await;
    }
}
