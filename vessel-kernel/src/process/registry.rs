//! Process registry: the thread-safe table of every process the container
//! has ever spawned (design doc §4.3).
//!
//! Follows the teacher's registry pattern: an `Arc<RwLock<HashMap<..>>>`
//! facade for the metadata table, with lock-free atomics for the counters
//! hot enough to matter (pid allocation, running count).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use vessel_shared::constants::process::MAX_PID;
use vessel_shared::errors::{ProcessErrorCode, VesselError, VesselResult};

use crate::bus::{EventBus, KernelEvent};
use crate::net::NetworkManager;

use super::types::{Pid, ProcessInfo, ProcessKind, ProcessStatus, SpawnOptions};

struct Entry {
    info: ProcessInfo,
    stdin_tx: tokio::sync::mpsc::Sender<Vec<u8>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Default)]
pub struct RegistryMetrics {
    pub spawned_total: AtomicU64,
    pub exited_total: AtomicU64,
    pub killed_total: AtomicU64,
}

pub struct ProcessRegistry {
    next_pid: AtomicU32,
    entries: RwLock<HashMap<Pid, Entry>>,
    bus: EventBus,
    net: RwLock<Option<Arc<NetworkManager>>>,
    pub metrics: Arc<RegistryMetrics>,
}

impl ProcessRegistry {
    pub fn new(bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            next_pid: AtomicU32::new(1),
            entries: RwLock::new(HashMap::new()),
            bus,
            net: RwLock::new(None),
            metrics: Arc::new(RegistryMetrics::default()),
        })
    }

    /// Wires the network manager in so process termination can cascade to
    /// the virtual servers it owns (design doc §4.6, cascading teardown).
    /// Called once at kernel boot, after both subsystems exist.
    pub fn bind_network(&self, net: Arc<NetworkManager>) {
        *self.net.write() = Some(net);
    }

    pub fn allocate_pid(&self) -> VesselResult<Pid> {
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        if pid > MAX_PID {
            return Err(VesselError::process(ProcessErrorCode::ESPAWN, "pid space exhausted"));
        }
        Ok(Pid(pid))
    }

    pub fn register(
        &self,
        pid: Pid,
        kind: ProcessKind,
        command: String,
        args: Vec<String>,
        opts: &SpawnOptions,
        stdin_tx: tokio::sync::mpsc::Sender<Vec<u8>>,
    ) -> ProcessInfo {
        let info = ProcessInfo {
            pid,
            parent_pid: opts.parent_pid,
            kind,
            command,
            args,
            cwd: opts.cwd.clone().unwrap_or_else(|| "/".to_string()),
            env: opts.env.clone(),
            status: ProcessStatus::Running,
            exit_code: None,
            started_at: Utc::now(),
            ended_at: None,
        };
        self.entries.write().insert(pid, Entry { info: info.clone(), stdin_tx, task: None });
        self.metrics.spawned_total.fetch_add(1, Ordering::Relaxed);
        info
    }

    /// Attaches the `tokio::spawn` handle running `pid`'s process body, so a
    /// later termination actually cancels the task instead of only flipping
    /// its registry status. A process whose handle is never attached (the
    /// RPC-only `Process::spawn` bridge path, which tracks metadata without
    /// owning an execution task) simply has nothing to abort at `finish`.
    pub fn attach_task(&self, pid: Pid, task: tokio::task::JoinHandle<()>) {
        if let Some(entry) = self.entries.write().get_mut(&pid) {
            entry.task = Some(task);
        }
    }

    pub fn get(&self, pid: Pid) -> VesselResult<ProcessInfo> {
        self.entries
            .read()
            .get(&pid)
            .map(|e| e.info.clone())
            .ok_or_else(|| VesselError::process(ProcessErrorCode::ESPAWN, format!("no such process: {}", pid.0)))
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        let mut v: Vec<_> = self.entries.read().values().map(|e| e.info.clone()).collect();
        v.sort_by_key(|p| p.pid.0);
        v
    }

    pub async fn write_stdin(&self, pid: Pid, data: Vec<u8>) -> VesselResult<()> {
        let stdin_tx = {
            let entries = self.entries.read();
            let entry = entries
                .get(&pid)
                .ok_or_else(|| VesselError::process(ProcessErrorCode::ESPAWN, format!("no such process: {}", pid.0)))?;
            entry.stdin_tx.clone()
        };
        stdin_tx
            .send(data)
            .await
            .map_err(|_| VesselError::process(ProcessErrorCode::ETERM, "process stdin closed"))
    }

    pub fn mark_exited(&self, pid: Pid, exit_code: i32) {
        self.finish(pid, ProcessStatus::Exited, Some(exit_code));
        self.metrics.exited_total.fetch_add(1, Ordering::Relaxed);
        self.bus.publish(KernelEvent::ProcessExit { pid: pid.0, exit_code });
    }

    pub fn mark_errored(&self, pid: Pid, message: String) {
        self.finish(pid, ProcessStatus::Errored, Some(1));
        self.bus.publish(KernelEvent::ProcessError { pid: pid.0, message });
    }

    pub fn mark_killed(&self, pid: Pid) {
        self.finish(pid, ProcessStatus::Killed, None);
        self.metrics.killed_total.fetch_add(1, Ordering::Relaxed);
        self.bus.publish(KernelEvent::ProcessExit { pid: pid.0, exit_code: -1 });
    }

    fn finish(&self, pid: Pid, status: ProcessStatus, exit_code: Option<i32>) {
        {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(&pid) {
                entry.info.status = status;
                entry.info.exit_code = exit_code;
                entry.info.ended_at = Some(Utc::now());
                // Aborting a task that already finished (the common case: a
                // process marks itself exited right before its own future
                // returns) is a harmless no-op. Aborting one still running
                // (an external kill) is what actually stops the work.
                if let Some(task) = entry.task.take() {
                    task.abort();
                }
            }
        }
        if let Some(net) = self.net.read().as_ref() {
            net.close_by_owner_pid(pid.0);
        }
    }

    /// Removes terminal processes older than `keep_last`, mirroring the
    /// teacher's bounded-history eviction for completed registry entries.
    pub fn reap(&self, keep_last: usize) {
        let mut entries = self.entries.write();
        let mut terminal: Vec<Pid> = entries
            .iter()
            .filter(|(_, e)| e.info.is_terminal())
            .map(|(pid, _)| *pid)
            .collect();
        if terminal.len() <= keep_last {
            return;
        }
        terminal.sort();
        for pid in &terminal[..terminal.len() - keep_last] {
            entries.remove(pid);
        }
    }

    /// Direct children of `pid` (design doc §4.3).
    pub fn children(&self, pid: Pid) -> Vec<Pid> {
        self.entries
            .read()
            .values()
            .filter(|e| e.info.parent_pid == Some(pid))
            .map(|e| e.info.pid)
            .collect()
    }

    /// `pid` and every descendant, in pre-order.
    pub fn tree(&self, pid: Pid) -> Vec<Pid> {
        let mut out = vec![pid];
        for child in self.children(pid) {
            out.extend(self.tree(child));
        }
        out
    }

    /// Terminates `pid`'s whole subtree in post-order: every child is fully
    /// terminated (recursively) before `pid` itself, so a child's exit event
    /// always reaches subscribers before its parent's (design doc §4.3,
    /// testable scenario 5). Plain [`mark_killed`] never cascades; this is
    /// the only cascading termination path.
    pub fn terminate_process_tree(&self, pid: Pid) {
        for child in self.children(pid) {
            self.terminate_process_tree(child);
        }
        if let Ok(info) = self.get(pid) {
            if !info.is_terminal() {
                self.mark_killed(pid);
            }
        }
    }

    /// Flat sweep killing every still-running process in the registry,
    /// regardless of parent/child relationship (design doc §4.3, `killAll`).
    pub fn kill_all(&self) {
        let pids: Vec<Pid> = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| !e.info.is_terminal())
            .map(|(pid, _)| *pid)
            .collect();
        for pid in pids {
            self.mark_killed(pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::stdio::StdioChannels;

    fn stdin_tx() -> tokio::sync::mpsc::Sender<Vec<u8>> {
        StdioChannels::new().split().1.stdin_tx
    }

    #[test]
    fn allocate_pid_increments() {
        let registry = ProcessRegistry::new(EventBus::new());
        let a = registry.allocate_pid().unwrap();
        let b = registry.allocate_pid().unwrap();
        assert_eq!(b.0, a.0 + 1);
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let registry = ProcessRegistry::new(EventBus::new());
        let pid = registry.allocate_pid().unwrap();
        let opts = SpawnOptions::default();
        registry.register(pid, ProcessKind::Script, "main.js".into(), vec![], &opts, stdin_tx());
        let info = registry.get(pid).unwrap();
        assert_eq!(info.command, "main.js");
        assert_eq!(info.status, ProcessStatus::Running);
    }

    #[tokio::test]
    async fn mark_exited_sets_terminal_status() {
        let registry = ProcessRegistry::new(EventBus::new());
        let pid = registry.allocate_pid().unwrap();
        registry.register(pid, ProcessKind::Builtin, "echo".into(), vec![], &SpawnOptions::default(), stdin_tx());
        registry.mark_exited(pid, 0);
        let info = registry.get(pid).unwrap();
        assert!(info.is_terminal());
        assert_eq!(info.exit_code, Some(0));
    }

    fn spawn_child(registry: &ProcessRegistry, parent: Option<Pid>) -> Pid {
        let pid = registry.allocate_pid().unwrap();
        let opts = SpawnOptions { cwd: None, env: Default::default(), parent_pid: parent };
        registry.register(pid, ProcessKind::Builtin, "echo".into(), vec![], &opts, stdin_tx());
        pid
    }

    #[tokio::test]
    async fn children_lists_only_direct_descendants() {
        let registry = ProcessRegistry::new(EventBus::new());
        let parent = spawn_child(&registry, None);
        let child_a = spawn_child(&registry, Some(parent));
        let child_b = spawn_child(&registry, Some(parent));
        let grandchild = spawn_child(&registry, Some(child_a));

        let mut children = registry.children(parent);
        children.sort_by_key(|p| p.0);
        let mut expected = vec![child_a, child_b];
        expected.sort_by_key(|p| p.0);
        assert_eq!(children, expected);
        assert_eq!(registry.children(child_a), vec![grandchild]);
        assert!(registry.children(child_b).is_empty());
    }

    #[tokio::test]
    async fn tree_includes_pid_and_all_descendants() {
        let registry = ProcessRegistry::new(EventBus::new());
        let parent = spawn_child(&registry, None);
        let child = spawn_child(&registry, Some(parent));
        let grandchild = spawn_child(&registry, Some(child));

        let mut tree = registry.tree(parent);
        tree.sort_by_key(|p| p.0);
        let mut expected = vec![parent, child, grandchild];
        expected.sort_by_key(|p| p.0);
        assert_eq!(tree, expected);
    }

    #[tokio::test]
    async fn terminate_process_tree_kills_children_before_parent() {
        let registry = ProcessRegistry::new(EventBus::new());
        let parent = spawn_child(&registry, None);
        let child = spawn_child(&registry, Some(parent));
        let grandchild = spawn_child(&registry, Some(child));

        registry.terminate_process_tree(parent);

        assert!(registry.get(parent).unwrap().is_terminal());
        assert!(registry.get(child).unwrap().is_terminal());
        assert!(registry.get(grandchild).unwrap().is_terminal());
    }

    #[tokio::test]
    async fn terminate_process_tree_does_not_touch_unrelated_processes() {
        let registry = ProcessRegistry::new(EventBus::new());
        let parent = spawn_child(&registry, None);
        let unrelated = spawn_child(&registry, None);

        registry.terminate_process_tree(parent);

        assert!(registry.get(parent).unwrap().is_terminal());
        assert!(!registry.get(unrelated).unwrap().is_terminal());
    }

    #[tokio::test]
    async fn kill_all_terminates_every_running_process_flat() {
        let registry = ProcessRegistry::new(EventBus::new());
        let parent = spawn_child(&registry, None);
        let child = spawn_child(&registry, Some(parent));
        let unrelated = spawn_child(&registry, None);

        registry.kill_all();

        assert!(registry.get(parent).unwrap().is_terminal());
        assert!(registry.get(child).unwrap().is_terminal());
        assert!(registry.get(unrelated).unwrap().is_terminal());
    }

    #[tokio::test]
    async fn finish_aborts_attached_task() {
        let registry = ProcessRegistry::new(EventBus::new());
        let pid = spawn_child(&registry, None);
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        registry.attach_task(pid, task);
        registry.mark_killed(pid);
        // Give the abort a chance to propagate; the task should never
        // complete its sleep.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(registry.get(pid).unwrap().is_terminal());
    }
}
