//! Network manager: the virtual port registry and request dispatcher
//! (design doc §4.6).
//!
//! There is no real socket underneath a virtual server; `listen` just
//! claims a port number in this registry and hands the caller the receive
//! end of a request channel. `handle_request` is the other end: it sends a
//! request envelope down that channel and waits (bounded by the handler
//! timeout) for a reply on a one-shot the caller is given alongside each
//! request. The gateway (net/gateway.rs) is what bridges this to an actual
//! TCP/WebSocket listener for host-side access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};

use vessel_shared::constants::network::HANDLER_TIMEOUT_MS;
use vessel_shared::errors::{NetworkErrorCode, VesselError, VesselResult};

use crate::bus::{EventBus, KernelEvent};

use super::stats::NetworkMetrics;
use super::types::{
    ConnectionState, HttpRequestEnvelope, HttpResponseEnvelope, ServerProtocol, VirtualConnection, VirtualServer,
};

/// One inbound request paired with the reply channel the manager is
/// waiting on.
pub type InboundRequest = (HttpRequestEnvelope, oneshot::Sender<HttpResponseEnvelope>);

struct ServerEntry {
    server: VirtualServer,
    handler: mpsc::Sender<InboundRequest>,
}

pub struct NetworkManager {
    servers: RwLock<HashMap<u16, ServerEntry>>,
    connections: RwLock<HashMap<u64, VirtualConnection>>,
    next_conn_id: AtomicU64,
    bus: EventBus,
    pub metrics: Arc<NetworkMetrics>,
}

impl NetworkManager {
    pub fn new(bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            servers: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            bus,
            metrics: Arc::new(NetworkMetrics::default()),
        })
    }

    /// Claims `port` for `owner_pid`, returning the server record and the
    /// receive end of its request channel. The caller (the script
    /// executor's handler loop, or the gateway) must keep draining this
    /// receiver or every `handle_request` against the port will time out.
    pub fn listen(
        &self,
        port: u16,
        protocol: ServerProtocol,
        owner_pid: u32,
    ) -> VesselResult<(VirtualServer, mpsc::Receiver<InboundRequest>)> {
        let mut servers = self.servers.write();
        if servers.contains_key(&port) {
            return Err(VesselError::network(NetworkErrorCode::EADDRINUSE, format!("port {port} in use")));
        }
        let server = VirtualServer { port, protocol, owner_pid };
        let (handler_tx, handler_rx) = mpsc::channel(64);
        servers.insert(port, ServerEntry { server: server.clone(), handler: handler_tx });

        self.metrics.servers_opened.fetch_add(1, Ordering::Relaxed);
        self.bus.publish(KernelEvent::ServerListen {
            port,
            server_type: format!("{protocol:?}"),
            owner_pid,
        });
        Ok((server, handler_rx))
    }

    pub fn close(&self, port: u16) -> VesselResult<()> {
        let mut servers = self.servers.write();
        let entry = servers
            .remove(&port)
            .ok_or_else(|| VesselError::network(NetworkErrorCode::ENOSERVER, format!("no server on port {port}")))?;
        self.metrics.servers_closed.fetch_add(1, Ordering::Relaxed);
        self.bus.publish(KernelEvent::ServerClose {
            port,
            server_type: format!("{:?}", entry.server.protocol),
        });
        Ok(())
    }

    pub fn list_servers(&self) -> Vec<VirtualServer> {
        let mut v: Vec<_> = self.servers.read().values().map(|e| e.server.clone()).collect();
        v.sort_by_key(|s| s.port);
        v
    }

    /// Closes every server owned by `pid`, returning the ports closed.
    /// Called when a process reaches a terminal state so its virtual
    /// servers don't outlive it (design doc §4.6, cascading teardown).
    pub fn close_by_owner_pid(&self, pid: u32) -> Vec<u16> {
        let victims: Vec<u16> = {
            let servers = self.servers.read();
            servers.values().filter(|e| e.server.owner_pid == pid).map(|e| e.server.port).collect()
        };
        for port in &victims {
            let _ = self.close(*port);
        }
        victims
    }

    /// Routes `request` to the handler registered for `port`, waiting up to
    /// the configured handler timeout for a response.
    pub async fn handle_request(&self, port: u16, request: HttpRequestEnvelope) -> VesselResult<HttpResponseEnvelope> {
        self.metrics.record_request();
        let handler = {
            let servers = self.servers.read();
            let entry = servers
                .get(&port)
                .ok_or_else(|| VesselError::network(NetworkErrorCode::ENOSERVER, format!("no server on port {port}")))?;
            entry.handler.clone()
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        handler
            .send((request, reply_tx))
            .await
            .map_err(|_| VesselError::network(NetworkErrorCode::EHANDLER, "handler channel closed"))?;

        match tokio::time::timeout(Duration::from_millis(HANDLER_TIMEOUT_MS), reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.metrics.record_error();
                Err(VesselError::network(NetworkErrorCode::EHANDLER, "handler dropped without replying"))
            }
            Err(_) => {
                self.metrics.record_error();
                Err(VesselError::network(NetworkErrorCode::ETIMEOUT, "handler timed out"))
            }
        }
    }

    pub fn open_connection(&self, port: u16, remote_addr: String) -> u64 {
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.connections.write().insert(
            id,
            VirtualConnection { id, port, remote_addr, state: ConnectionState::Open },
        );
        self.metrics.connections_opened.fetch_add(1, Ordering::Relaxed);
        id
    }

    pub fn close_connection(&self, id: u64) {
        if let Some(conn) = self.connections.write().get_mut(&id) {
            conn.state = ConnectionState::Closed;
        }
        self.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_rejects_duplicate_port() {
        let manager = NetworkManager::new(EventBus::new());
        let _ = manager.listen(80, ServerProtocol::Http, 1).unwrap();
        let err = manager.listen(80, ServerProtocol::Http, 2).unwrap_err();
        assert_eq!(err.short_code(), "EADDRINUSE");
    }

    #[tokio::test]
    async fn handle_request_round_trips_through_handler() {
        let manager = NetworkManager::new(EventBus::new());
        let (_server, mut rx) = manager.listen(80, ServerProtocol::Http, 1).unwrap();

        let responder = tokio::spawn(async move {
            let (_req, reply) = rx.recv().await.unwrap();
            reply
                .send(HttpResponseEnvelope { status: 200, headers: Default::default(), body: b"ok".to_vec() })
                .unwrap();
        });

        let request = HttpRequestEnvelope {
            method: "GET".into(),
            path: "/".into(),
            headers: Default::default(),
            body: Vec::new(),
        };
        let response = manager.handle_request(80, request).await.unwrap();
        assert_eq!(response.status, 200);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn handle_request_times_out_without_handler_reply() {
        let manager = NetworkManager::new(EventBus::new());
        let (_server, _rx) = manager.listen(80, ServerProtocol::Http, 1).unwrap();
        let request = HttpRequestEnvelope {
            method: "GET".into(),
            path: "/".into(),
            headers: Default::default(),
            body: Vec::new(),
        };
        let err = manager.handle_request(80, request).await.unwrap_err();
        assert_eq!(err.short_code(), "ETIMEOUT");
    }

    #[test]
    fn close_by_owner_pid_only_closes_that_pids_servers() {
        let manager = NetworkManager::new(EventBus::new());
        let _ = manager.listen(80, ServerProtocol::Http, 1).unwrap();
        let _ = manager.listen(81, ServerProtocol::Http, 1).unwrap();
        let _ = manager.listen(82, ServerProtocol::Http, 2).unwrap();

        let closed = manager.close_by_owner_pid(1);
        assert_eq!(closed.len(), 2);
        let remaining: Vec<u16> = manager.list_servers().iter().map(|s| s.port).collect();
        assert_eq!(remaining, vec![82]);
    }
}
