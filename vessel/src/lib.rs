//! Embeddable sandboxed runtime: a virtual filesystem, process table, and
//! virtual network surface hosted entirely in-process.
//!
//! [`Container::boot`] is the entry point; everything else hangs off the
//! returned [`Container`] (`container.fs()`, `container.spawn(...)`,
//! `container.on()`, `container.teardown()`). The heavy lifting lives in
//! `vessel-kernel`; this crate is the ergonomic, host-facing shell around
//! it, plus the bits (mount trees, metrics) that only make sense at the
//! embedding boundary.

mod container;
mod events;
mod fs_client;
pub mod logging;
mod metrics;
mod mount;
mod options;
mod process_client;

pub use container::{Container, ContainerEvents};
pub use events::{ContainerEvent, FileEvent, Watcher};
pub use fs_client::FsHandle;
pub use metrics::{runtime_metrics, ContainerMetrics, RuntimeMetrics};
pub use options::{FsNode, VesselOptions};
pub use process_client::{ProcessHandle, SpawnArgs};

pub use vessel_kernel::process::{ProcessInfo, ProcessKind, ProcessStatus};
pub use vessel_shared::errors::{VesselError, VesselResult};
