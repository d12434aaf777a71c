//! RPC bridge: the typed duplex boundary between the outer client and the
//! inner kernel (design doc §4.7).
//!
//! The bridge itself is transport-agnostic; `serve` takes anything
//! implementing `AsyncRead + AsyncWrite` and drives a tonic server over it.
//! The common case is an in-memory `tokio::io::duplex` pair for the
//! single-process embedding; `serve_unix`/`serve_tcp` exist for the CLI and
//! test harness to attach to an already-running kernel out of process.

mod server;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tonic::transport::server::Connected;
use tonic::transport::Server;

use vessel_shared::generated::{
    events_server::EventsServer, fs_server::FsServer, kernel_server::KernelServer, network_server::NetworkServer,
    process_server::ProcessServer,
};

use crate::bus::EventBus;
use crate::net::NetworkManager;
use crate::process::ProcessRegistry;
use crate::vfs::VfsFacade;

pub use server::BridgeHandles;

/// Wraps an arbitrary duplex stream (a `tokio::io::DuplexStream`, a Unix
/// socket, a TCP socket) so it satisfies tonic's `Connected` bound without
/// exposing any real peer-address metadata — the in-process transport has
/// none to give.
pub struct DuplexConn<S>(pub S);

impl<S: AsyncRead + Unpin> AsyncRead for DuplexConn<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DuplexConn<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
    }
}

impl<S> Connected for DuplexConn<S> {
    type ConnectInfo = ();

    fn connect_info(&self) -> Self::ConnectInfo {}
}

/// Builds the composed gRPC service (all five bridge services wired to one
/// set of kernel handles) as a `tower` service ready to drive over any
/// connection.
pub fn build_router(vfs: Arc<VfsFacade>, net: Arc<NetworkManager>, registry: Arc<ProcessRegistry>, bus: EventBus) -> tonic::transport::server::Router {
    let handles = BridgeHandles { vfs, net, registry, bus: bus.clone() };

    Server::builder()
        .add_service(FsServer::new(server::FsService::new(handles.clone())))
        .add_service(ProcessServer::new(server::ProcessServiceImpl::new(handles.clone())))
        .add_service(NetworkServer::new(server::NetworkServiceImpl::new(handles.clone())))
        .add_service(KernelServer::new(server::KernelServiceImpl::new(handles.clone())))
        .add_service(EventsServer::new(server::EventsServiceImpl::new(bus)))
}

/// Serves the bridge over a single already-established duplex connection
/// (the in-process case: one end goes to the outer `Container`, the other
/// is driven here).
pub async fn serve_on_duplex<S>(
    vfs: Arc<VfsFacade>,
    net: Arc<NetworkManager>,
    registry: Arc<ProcessRegistry>,
    bus: EventBus,
    stream: S,
) -> Result<(), tonic::transport::Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let router = build_router(vfs, net, registry, bus);
    let incoming = tokio_stream::once(Ok::<_, std::io::Error>(DuplexConn(stream)));
    router.serve_with_incoming(incoming).await
}

/// Serves the bridge on a Unix-domain socket, for the CLI/test harness to
/// attach to a kernel running as a background task in another process.
pub async fn serve_unix(
    vfs: Arc<VfsFacade>,
    net: Arc<NetworkManager>,
    registry: Arc<ProcessRegistry>,
    bus: EventBus,
    socket_path: &std::path::Path,
) -> Result<(), tonic::transport::Error> {
    let _ = std::fs::remove_file(socket_path);
    let listener = tokio::net::UnixListener::bind(socket_path).expect("bind bridge unix socket");
    let incoming = tokio_stream::wrappers::UnixListenerStream::new(listener);
    build_router(vfs, net, registry, bus).serve_with_incoming(incoming).await
}

/// Serves the bridge on a TCP loopback port.
pub async fn serve_tcp(
    vfs: Arc<VfsFacade>,
    net: Arc<NetworkManager>,
    registry: Arc<ProcessRegistry>,
    bus: EventBus,
    port: u16,
) -> Result<(), tonic::transport::Error> {
    let addr = format!("127.0.0.1:{port}").parse().expect("valid loopback address");
    build_router(vfs, net, registry, bus).serve(addr).await
}
