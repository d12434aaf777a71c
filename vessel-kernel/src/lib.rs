//! Inner runtime kernel: the VFS, process registry, script/shell executors,
//! virtual network, and RPC bridge that together back a single booted
//! container.

pub mod bridge;
pub mod bus;
pub mod kernel;
pub mod net;
pub mod process;
pub mod vfs;

pub use kernel::{BootOptions, Kernel};
