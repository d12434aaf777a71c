//! Outer boot options (design doc §6: `Container::boot(options)`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options recognised by [`crate::Container::boot`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VesselOptions {
    /// Name used to derive the kernel's on-disk home (log file, persisted
    /// VFS database); validated the same way the kernel validates
    /// `workdir_name` (no path separators, no `.`/`..`).
    pub workdir_name: String,

    /// Cross-Origin-Embedder-Policy hint carried through from the original
    /// browser-hosted embedding; kept as an opt-in marker for the gateway's
    /// CORS headers even though this Rust embedding has no browser origin
    /// of its own.
    pub coep: bool,

    /// Surface preview/runtime errors through the `error` event rather
    /// than only logging them.
    pub forward_preview_errors: bool,

    /// Initial filesystem tree to mount at boot, keyed by absolute path.
    #[serde(default)]
    pub filesystem: std::collections::BTreeMap<String, FsNode>,

    /// Base URL the gateway advertises for constructed preview links.
    pub base_url: Option<String>,

    /// Where to persist the VFS database; `None` boots an ephemeral,
    /// in-memory-only container.
    #[serde(skip)]
    pub persist_path: Option<PathBuf>,
}

/// A node in the `filesystem` mount tree (design doc §6, `container.mount`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FsNode {
    Directory { entries: std::collections::BTreeMap<String, FsNode> },
    File { contents: Vec<u8> },
    Symlink { target: String },
}

impl VesselOptions {
    pub fn new(workdir_name: impl Into<String>) -> Self {
        Self { workdir_name: workdir_name.into(), ..Default::default() }
    }

    pub fn with_persist_path(mut self, path: PathBuf) -> Self {
        self.persist_path = Some(path);
        self
    }

    pub fn with_filesystem(mut self, filesystem: std::collections::BTreeMap<String, FsNode>) -> Self {
        self.filesystem = filesystem;
        self
    }

    pub(crate) fn to_kernel_options(&self) -> vessel_kernel::BootOptions {
        vessel_kernel::BootOptions {
            workdir_name: self.workdir_name.clone(),
            persist_path: self.persist_path.clone(),
        }
    }
}
