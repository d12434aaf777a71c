//! Outer-facing process handle (design doc §6, `container.spawn`).

use std::sync::Arc;

use vessel_kernel::net::NetworkManager;
use vessel_kernel::process::{
    self, shell, ProcessKind, ProcessRegistry, ScriptContext, SpawnOptions, StdioChannels, StdioHandle,
};
use vessel_kernel::vfs::VfsFacade;
use vessel_shared::errors::{ProcessErrorCode, VesselError, VesselResult};

#[derive(Clone, Default)]
pub struct SpawnArgs {
    pub cwd: Option<String>,
    pub env: std::collections::BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct ProcessClient {
    vfs: Arc<VfsFacade>,
    net: Arc<NetworkManager>,
    registry: Arc<ProcessRegistry>,
}

impl ProcessClient {
    pub(crate) fn new(vfs: Arc<VfsFacade>, net: Arc<NetworkManager>, registry: Arc<ProcessRegistry>) -> Self {
        Self { vfs, net, registry }
    }

    /// Spawns `command args...`. A recognised builtin or shell pipeline
    /// runs against the shell executor; anything ending in `.js` is loaded
    /// as a script. There is no notion of exec-ing an arbitrary host
    /// binary — this container has no other binaries to exec.
    pub async fn spawn(&self, command: &str, args: &[String], opts: SpawnArgs) -> VesselResult<ProcessHandle> {
        let pid = self.registry.allocate_pid()?;
        let spawn_opts = SpawnOptions {
            cwd: opts.cwd.clone(),
            env: opts.env.clone(),
            parent_pid: None,
        };

        let channels = StdioChannels::new();
        let (owned, handle) = channels.split();

        let kind = if command.ends_with(".js") { ProcessKind::Script } else { ProcessKind::Shell };
        let info =
            self.registry
                .register(pid, kind, command.to_string(), args.to_vec(), &spawn_opts, handle.stdin_tx.clone());

        match kind {
            ProcessKind::Script => {
                let module_path = command.to_string();
                let source = self
                    .vfs
                    .read_file(&module_path)
                    .await
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default();
                let ctx = ScriptContext { vfs: self.vfs.clone(), net: self.net.clone(), registry: self.registry.clone() };
                #[cfg(feature = "boa-engine")]
                let engine = vessel_kernel::process::engine::BoaEngine::new();
                #[cfg(not(feature = "boa-engine"))]
                let engine = vessel_kernel::process::engine::NullEngine;
                let task = tokio::spawn(process::run_script(engine, pid, module_path, source, owned, ctx));
                self.registry.attach_task(pid, task);
            }
            ProcessKind::Shell | ProcessKind::Builtin => {
                let vfs = self.vfs.clone();
                let registry = self.registry.clone();
                let command = command.to_string();
                let args = args.to_vec();
                let cwd = info.cwd.clone();
                let task = tokio::spawn(async move {
                    run_shell_process(pid, command, args, cwd, vfs, registry, owned).await;
                });
                self.registry.attach_task(pid, task);
            }
        }

        Ok(ProcessHandle { pid: pid.0, handle, registry: self.registry.clone() })
    }
}

async fn run_shell_process(
    pid: process::Pid,
    command: String,
    args: Vec<String>,
    cwd: String,
    vfs: Arc<VfsFacade>,
    registry: Arc<ProcessRegistry>,
    mut stdio: process::ProcessStdio,
) {
    let mut full = vec![command];
    full.extend(args);
    let joined = full.join(" ");
    let tokens = match shell::tokenize(&joined) {
        Ok(t) => t,
        Err(e) => {
            registry.mark_errored(pid, e.to_string());
            return;
        }
    };
    let pipeline = shell::split_pipeline(tokens);
    let ctx = shell::new_context(vfs, cwd);

    let result = shell::run_pipeline(pipeline, &ctx, pid, |_cmd, _args, _stdin| {
        Box::pin(async { Err(VesselError::process(ProcessErrorCode::ESCRIPT, "nested script stages not supported")) })
    })
    .await;

    match result {
        Ok(output) => {
            let _ = stdio.stdout_tx.send(output.stdout).await;
            if !output.stderr.is_empty() {
                let _ = stdio.stderr_tx.send(output.stderr).await;
            }
            registry.mark_exited(pid, output.exit_code);
        }
        Err(e) => registry.mark_errored(pid, e.to_string()),
    }
}

/// A running (or finished) process, returned by [`ProcessClient::spawn`].
pub struct ProcessHandle {
    pid: u32,
    handle: StdioHandle,
    registry: Arc<ProcessRegistry>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub async fn write_input(&self, data: Vec<u8>) -> VesselResult<()> {
        self.registry.write_stdin(process::Pid(self.pid), data).await
    }

    pub async fn next_output(&mut self) -> Option<Vec<u8>> {
        self.handle.stdout_rx.recv().await
    }

    pub async fn next_error(&mut self) -> Option<Vec<u8>> {
        self.handle.stderr_rx.recv().await
    }

    /// Disjoint mutable access to both output channels, for callers that
    /// need to `tokio::select!` over stdout and stderr concurrently instead
    /// of draining them one at a time.
    pub fn split_output(
        &mut self,
    ) -> (&mut tokio::sync::mpsc::Receiver<Vec<u8>>, &mut tokio::sync::mpsc::Receiver<Vec<u8>>) {
        (&mut self.handle.stdout_rx, &mut self.handle.stderr_rx)
    }

    pub fn kill(&self) {
        self.registry.mark_killed(process::Pid(self.pid));
    }

    /// Resolves once the process reaches a terminal state, yielding its
    /// exit code (`-1` if killed).
    pub async fn exit(&self) -> i32 {
        loop {
            if let Ok(info) = self.registry.get(process::Pid(self.pid)) {
                if info.is_terminal() {
                    return info.exit_code.unwrap_or(-1);
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}
