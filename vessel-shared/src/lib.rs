//! Vessel Shared - types and wire protocol shared by the outer client and
//! the inner container kernel.
//!
//! This crate contains the bridge's message schema (generated from
//! `proto/vessel/v1/service.proto`), the shared error taxonomy, and a handful
//! of constants both sides must agree on.

pub mod constants;
pub mod errors;
pub mod transport;

// Generated protobuf types.
pub mod generated {
    #![allow(clippy::all, unused_qualifications)]
    tonic::include_proto!("vessel.v1");
}

pub use errors::{VesselError, VesselResult};
pub use transport::Transport;

pub use generated::fs_client::FsClient;
pub use generated::fs_server::{Fs, FsServer};

pub use generated::process_client::ProcessClient;
pub use generated::process_server::{Process, ProcessServer};

pub use generated::network_client::NetworkClient;
pub use generated::network_server::{Network, NetworkServer};

pub use generated::kernel_client::KernelClient;
pub use generated::kernel_server::{Kernel, KernelServer};

pub use generated::events_client::EventsClient;
pub use generated::events_server::{Events, EventsServer};

pub use generated::*;
