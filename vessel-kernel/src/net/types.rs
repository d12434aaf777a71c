//! Virtual network data types (design doc §3, Virtual Server / Virtual
//! Connection).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerProtocol {
    Tcp,
    Tls,
    Http,
    Dgram,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VirtualServer {
    pub port: u16,
    pub protocol: ServerProtocol,
    pub owner_pid: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Open,
    Closed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VirtualConnection {
    pub id: u64,
    pub port: u16,
    pub remote_addr: String,
    pub state: ConnectionState,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpRequestEnvelope {
    pub method: String,
    pub path: String,
    pub headers: std::collections::BTreeMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpResponseEnvelope {
    pub status: u16,
    pub headers: std::collections::BTreeMap<String, String>,
    pub body: Vec<u8>,
}
