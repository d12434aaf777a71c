//! Virtual network: port registry, host gateway, guest-visible adapters,
//! and metrics.

pub mod adapters;
pub mod gateway;
pub mod manager;
pub mod stats;
pub mod types;

pub use manager::{InboundRequest, NetworkManager};
pub use stats::NetworkMetrics;
pub use types::{
    ConnectionState, HttpRequestEnvelope, HttpResponseEnvelope, ServerProtocol, VirtualConnection, VirtualServer,
};
