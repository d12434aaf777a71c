//! Script executor: runs a JS source file against a [`ScriptEngine`] as one
//! cooperatively-scheduled process (design doc §4.4).
//!
//! Boot sequence: allocate a pid, register stdio, load the entry module,
//! then pump the engine's job queue until it suspends on a host call, goes
//! idle (parked until the next stdin chunk or bridge wakeup), or completes.
//! A suspended host call is serviced against the VFS/network facades and
//! the result fed back with `resume`; this is also the path a spawned
//! child process's completion notification arrives through, so scripts can
//! `await spawn(...)`.

use std::sync::Arc;

use vessel_shared::errors::VesselResult;

use crate::net::types::{HttpResponseEnvelope, ServerProtocol};
use crate::net::NetworkManager;
use crate::vfs::VfsFacade;

use super::engine::{EngineStep, HostCall, ScriptEngine};
use super::registry::ProcessRegistry;
use super::stdio::ProcessStdio;
use super::types::Pid;

/// Everything a running script needs to service host calls.
pub struct ScriptContext {
    pub vfs: Arc<VfsFacade>,
    pub net: Arc<NetworkManager>,
    pub registry: Arc<ProcessRegistry>,
}

/// Drives a single script process to completion. Spawned onto the
/// container's single-threaded runtime as one task per process; the
/// cooperative scheduling invariant comes from `tokio::task::yield_now`
/// between pump iterations rather than from OS preemption.
pub async fn run_script<E: ScriptEngine>(
    mut engine: E,
    pid: Pid,
    module_path: String,
    source: String,
    mut stdio: ProcessStdio,
    ctx: ScriptContext,
) {
    if let Err(e) = engine.load(&module_path, &source) {
        ctx.registry.mark_errored(pid, e.to_string());
        return;
    }

    loop {
        let step = match engine.run() {
            Ok(step) => step,
            Err(e) => {
                ctx.registry.mark_errored(pid, e.to_string());
                return;
            }
        };

        let out = engine.take_stdout();
        if !out.is_empty() {
            let _ = stdio.stdout_tx.send(out).await;
        }

        match step {
            EngineStep::Completed => {
                ctx.registry.mark_exited(pid, 0);
                return;
            }
            EngineStep::Idle => {
                tokio::select! {
                    biased;
                    chunk = stdio.stdin_rx.recv() => {
                        match chunk {
                            Some(data) => {
                                if let Err(e) = engine.feed_stdin(&data) {
                                    ctx.registry.mark_errored(pid, e.to_string());
                                    return;
                                }
                            }
                            None => {
                                ctx.registry.mark_exited(pid, 0);
                                return;
                            }
                        }
                    }
                }
            }
            EngineStep::Suspended(call) => {
                let result = service_host_call(&ctx, pid, &call).await;
                let result_json = match result {
                    Ok(json) => json,
                    Err(e) => format!(r#"{{"error":{:?}}}"#, e.to_string()),
                };
                if let Err(e) = engine.resume(&result_json) {
                    ctx.registry.mark_errored(pid, e.to_string());
                    return;
                }
            }
        }
        tokio::task::yield_now().await;
    }
}

/// Services one suspended host call. Only `fs.*` and `net.listen`/`net.close`
/// are wired up; sockets, DNS, `child_process`, datagram, TLS, and crypto
/// bindings are out of scope (no guest-visible API surface calls into them)
/// and fall through to the `unknown host call` branch.
async fn service_host_call(ctx: &ScriptContext, pid: Pid, call: &HostCall) -> VesselResult<String> {
    match call.name.as_str() {
        "fs.readFile" => {
            let path: String = serde_json::from_str(&call.args_json).unwrap_or_default();
            let content = ctx.vfs.read_file(&path).await?;
            Ok(serde_json::to_string(&String::from_utf8_lossy(&content)).unwrap_or_default())
        }
        "fs.writeFile" => {
            #[derive(serde::Deserialize)]
            struct Args {
                path: String,
                content: String,
            }
            let args: Args = serde_json::from_str(&call.args_json)
                .map_err(|e| vessel_shared::errors::VesselError::Internal(e.to_string()))?;
            ctx.vfs.write_file(&args.path, args.content.into_bytes()).await?;
            Ok("null".to_string())
        }
        "net.listen" => {
            #[derive(serde::Deserialize)]
            struct Args {
                port: u16,
                #[serde(default)]
                protocol: String,
            }
            let args: Args = serde_json::from_str(&call.args_json)
                .map_err(|e| vessel_shared::errors::VesselError::Internal(e.to_string()))?;
            let protocol = match args.protocol.as_str() {
                "tcp" => ServerProtocol::Tcp,
                "tls" => ServerProtocol::Tls,
                "dgram" => ServerProtocol::Dgram,
                _ => ServerProtocol::Http,
            };
            let (server, mut inbound) = ctx.net.listen(args.port, protocol, pid.0)?;
            // No request ever reaches the script itself: the engine has no
            // way to suspend mid-request and hand a listening process a
            // second host call on top of the one it's already blocked on.
            // Every inbound request gets a flat 501 until that's threaded
            // through; `net.close`/process teardown stops this task by
            // dropping the handler sender, which ends `inbound.recv()`.
            tokio::spawn(async move {
                while let Some((_request, reply)) = inbound.recv().await {
                    let _ = reply.send(HttpResponseEnvelope {
                        status: 501,
                        headers: Default::default(),
                        body: b"virtual server has no request handler".to_vec(),
                    });
                }
            });
            Ok(serde_json::to_string(&server.port).unwrap_or_default())
        }
        "net.close" => {
            let port: u16 = serde_json::from_str(&call.args_json).unwrap_or_default();
            ctx.net.close(port)?;
            Ok("null".to_string())
        }
        other => Ok(format!(r#"{{"error":"unknown host call {other}"}}"#)),
    }
}
