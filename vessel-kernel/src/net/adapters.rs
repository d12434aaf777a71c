//! Guest-visible network-capability adapters (design doc §4.6, §9 glossary
//! "Gateway").
//!
//! These are the Rust-side implementations the script executor's `socket`,
//! `dns`, `dgram`, and `child_process` host bindings call into. They talk
//! to real host resources directly rather than round-tripping through the
//! gateway's HTTP surface when running in-process (the gateway's REST/WS
//! endpoints in `gateway.rs` exist for an out-of-process embedder driving
//! the same capabilities over the network); both paths reach the same
//! tokio primitives.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream, UdpSocket};

use vessel_shared::errors::{NetworkErrorCode, VesselError, VesselResult};

#[async_trait::async_trait]
pub trait NetworkAdapter: Send + Sync {
    async fn dns_lookup(&self, hostname: &str) -> VesselResult<Vec<String>>;
    async fn tcp_connect(&self, host: &str, port: u16) -> VesselResult<TcpSocketHandle>;
    async fn udp_send(&self, host: &str, port: u16, data: &[u8]) -> VesselResult<usize>;
}

/// A connected TCP socket handed back to the guest-visible `socket` shim.
pub struct TcpSocketHandle {
    stream: TcpStream,
}

impl TcpSocketHandle {
    pub async fn write(&mut self, data: &[u8]) -> VesselResult<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|e| VesselError::network(NetworkErrorCode::EHANDLER, e.to_string()))
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> VesselResult<usize> {
        self.stream
            .read(buf)
            .await
            .map_err(|e| VesselError::network(NetworkErrorCode::EHANDLER, e.to_string()))
    }
}

/// The reference adapter implementation: real DNS, real outbound TCP/UDP.
#[derive(Default)]
pub struct HostNetworkAdapter;

#[async_trait::async_trait]
impl NetworkAdapter for HostNetworkAdapter {
    async fn dns_lookup(&self, hostname: &str) -> VesselResult<Vec<String>> {
        let addrs = lookup_host((hostname, 0))
            .await
            .map_err(|e| VesselError::network(NetworkErrorCode::EHANDLER, e.to_string()))?;
        Ok(addrs.map(|a: SocketAddr| a.ip().to_string()).collect())
    }

    async fn tcp_connect(&self, host: &str, port: u16) -> VesselResult<TcpSocketHandle> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| VesselError::network(NetworkErrorCode::EHANDLER, e.to_string()))?;
        Ok(TcpSocketHandle { stream })
    }

    async fn udp_send(&self, host: &str, port: u16, data: &[u8]) -> VesselResult<usize> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| VesselError::network(NetworkErrorCode::EHANDLER, e.to_string()))?;
        socket
            .send_to(data, (host, port))
            .await
            .map_err(|e| VesselError::network(NetworkErrorCode::EHANDLER, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dns_lookup_resolves_localhost() {
        let adapter = HostNetworkAdapter;
        let addresses = adapter.dns_lookup("localhost").await.unwrap();
        assert!(!addresses.is_empty());
    }
}
