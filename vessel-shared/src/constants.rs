//! Constants shared between the outer client and the inner kernel.
//!
//! These must stay identical on both sides of the bridge.

/// Bridge protocol constants.
pub mod bridge {
    /// Default deadline applied to a request when the caller does not
    /// specify one explicitly.
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Maximum number of concurrently pending requests before new sends
    /// observe backpressure.
    pub const MAX_PENDING_REQUESTS: usize = 256;

    /// Capacity of the broadcast channel used to fan out kernel events.
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
}

/// VFS constants.
pub mod vfs {
    /// Path under which the built-in primordials/internalBinding resources
    /// are provisioned at container init.
    pub const BUILTINS_ROOT: &str = "/builtins";

    /// Default result cap for `textSearch`.
    pub const DEFAULT_RESULT_LIMIT: u32 = 500;
}

/// Process subsystem constants.
pub mod process {
    /// Highest pid the registry will allocate before entering a failure
    /// state (mirrors a 31-bit signed counter headroom).
    pub const MAX_PID: u32 = i32::MAX as u32;

    /// Batch size for one iteration of the script executor's job-queue drain.
    pub const JOB_DRAIN_BATCH: usize = 64;

    /// Environment variable naming which executor strategy should run a
    /// shell-dispatched command (mirrors the teacher's `BOXLITE_EXECUTOR`).
    pub const ENV_EXECUTOR: &str = "VESSEL_EXECUTOR";
}

/// Network manager constants.
pub mod network {
    /// Window size for the requests-per-minute sliding counter.
    pub const RPM_WINDOW_SECS: u64 = 60;

    /// Default timeout applied to `handleRequest` while waiting for the
    /// owning process's handler to respond.
    pub const HANDLER_TIMEOUT_MS: u64 = 10_000;
}
