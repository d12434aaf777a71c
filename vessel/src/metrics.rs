//! Two-level metrics surface (design doc §6, ambient stack): per-container
//! counters plus a runtime-wide aggregate, mirroring the teacher's
//! `BoxMetrics`/`RuntimeMetrics` split — one handle per container, one
//! shared aggregate across every container booted in this process.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use vessel_kernel::net::NetworkMetrics;
use vessel_kernel::process::ProcessRegistry;

/// Snapshot of a single container's activity.
#[derive(Clone, Debug)]
pub struct ContainerMetrics {
    pub processes_spawned_total: u64,
    pub processes_exited_total: u64,
    pub processes_killed_total: u64,
    pub network_servers_opened_total: u64,
    pub network_servers_closed_total: u64,
    pub network_bytes_sent_total: u64,
    pub network_bytes_received_total: u64,
    pub network_requests_total: u64,
    pub network_errors_total: u64,
}

impl ContainerMetrics {
    pub(crate) fn snapshot(registry: &ProcessRegistry, net: &NetworkMetrics) -> Self {
        Self {
            processes_spawned_total: registry.metrics.spawned_total.load(Ordering::Relaxed),
            processes_exited_total: registry.metrics.exited_total.load(Ordering::Relaxed),
            processes_killed_total: registry.metrics.killed_total.load(Ordering::Relaxed),
            network_servers_opened_total: net.servers_opened.load(Ordering::Relaxed),
            network_servers_closed_total: net.servers_closed.load(Ordering::Relaxed),
            network_bytes_sent_total: net.bytes_sent.load(Ordering::Relaxed),
            network_bytes_received_total: net.bytes_received.load(Ordering::Relaxed),
            network_requests_total: net.requests_total.load(Ordering::Relaxed),
            network_errors_total: net.errors_total.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide aggregate across every container this embedding has booted,
/// kept alive for the process lifetime rather than per-container.
#[derive(Clone, Default)]
pub struct RuntimeMetricsStorage {
    containers_booted: Arc<std::sync::atomic::AtomicU64>,
    containers_disposed: Arc<std::sync::atomic::AtomicU64>,
    boot_failures: Arc<std::sync::atomic::AtomicU64>,
}

impl RuntimeMetricsStorage {
    pub(crate) fn record_boot(&self) {
        self.containers_booted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispose(&self) {
        self.containers_disposed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_boot_failure(&self) {
        self.boot_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handle(&self) -> RuntimeMetrics {
        RuntimeMetrics { storage: self.clone() }
    }
}

/// Cloneable handle for querying the process-wide aggregate.
#[derive(Clone, Default)]
pub struct RuntimeMetrics {
    storage: RuntimeMetricsStorage,
}

impl RuntimeMetrics {
    pub fn containers_booted_total(&self) -> u64 {
        self.storage.containers_booted.load(Ordering::Relaxed)
    }

    pub fn containers_disposed_total(&self) -> u64 {
        self.storage.containers_disposed.load(Ordering::Relaxed)
    }

    pub fn boot_failures_total(&self) -> u64 {
        self.storage.boot_failures.load(Ordering::Relaxed)
    }

    pub fn containers_live(&self) -> u64 {
        self.containers_booted_total().saturating_sub(self.containers_disposed_total())
    }
}

/// Process-wide singleton, analogous to the teacher's runtime-level
/// aggregate shared across every box it creates.
static RUNTIME_METRICS: std::sync::OnceLock<RuntimeMetricsStorage> = std::sync::OnceLock::new();

pub(crate) fn runtime_metrics_storage() -> &'static RuntimeMetricsStorage {
    RUNTIME_METRICS.get_or_init(RuntimeMetricsStorage::default)
}

/// Returns a handle to the process-wide metrics aggregate.
pub fn runtime_metrics() -> RuntimeMetrics {
    runtime_metrics_storage().handle()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercises a fresh `RuntimeMetricsStorage` directly rather than the
    // process-wide singleton, since tests run concurrently and would
    // otherwise race each other's counters.
    #[test]
    fn containers_live_tracks_boot_and_dispose() {
        let storage = RuntimeMetricsStorage::default();
        let handle = storage.handle();
        assert_eq!(handle.containers_live(), 0);

        storage.record_boot();
        storage.record_boot();
        assert_eq!(handle.containers_booted_total(), 2);
        assert_eq!(handle.containers_live(), 2);

        storage.record_dispose();
        assert_eq!(handle.containers_disposed_total(), 1);
        assert_eq!(handle.containers_live(), 1);
    }

    #[test]
    fn boot_failure_does_not_count_as_live() {
        let storage = RuntimeMetricsStorage::default();
        storage.record_boot_failure();
        let handle = storage.handle();
        assert_eq!(handle.boot_failures_total(), 1);
        assert_eq!(handle.containers_live(), 0);
    }
}
